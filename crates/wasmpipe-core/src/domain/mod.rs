//! Domain model (payloads, images, invocations, states, errors, ids).

pub mod errors;
pub mod ids;
pub mod image;
pub mod interface_type;
pub mod invocation;
pub mod io;
pub mod payload;
pub mod state;

pub use self::errors::{ErrorKind, PipelineError};
pub use self::ids::{InvocationId, WorkerId};
pub use self::image::{ComponentType, Image, ImageType, PixelType};
pub use self::interface_type::InterfaceType;
pub use self::invocation::{Invocation, InvocationArgs, MEMORY_IO_FLAG, RunResult};
pub use self::io::{PipelineInput, PipelineOutput};
pub use self::payload::{BinaryFile, TextFile, TypedPayload};
pub use self::state::InvocationState;
