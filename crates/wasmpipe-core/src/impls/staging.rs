//! Staging - memory-io スロットとファイルの相互変換
//!
//! 子プロセスとはメモリを共有できないため、メモリスロットはスクラッチディレクトリ上の
//! ファイルとして受け渡します。ディレクトリは `WASMPIPE_MEMORY_IO_DIR` で子に伝えます。
//!
//! # ファイル名
//! - 入力スロット i: `input-<i>.<ext>` / 出力スロット i: `output-<i>.<ext>`
//! - ext: JSON は `json`、テキストは `txt`、バイナリは `bin`、
//!   Image は `image.json`（ヘッダ）+ `image.data`（ピクセル）

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use crate::domain::{BinaryFile, Image, InterfaceType, PipelineError, PipelineOutput, TextFile, TypedPayload};

/// Environment variable that tells a child process where its slots live.
pub const MEMORY_IO_DIR_ENV: &str = "WASMPIPE_MEMORY_IO_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDirection {
    Input,
    Output,
}

impl SlotDirection {
    fn prefix(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// Path of a non-image slot file.
pub fn slot_path(dir: &Path, direction: SlotDirection, index: usize, kind: InterfaceType) -> PathBuf {
    let ext = match kind {
        InterfaceType::TextStream | InterfaceType::TextFile => "txt",
        InterfaceType::BinaryStream | InterfaceType::BinaryFile => "bin",
        InterfaceType::JsonCompatible => "json",
        InterfaceType::Image => "image.json",
    };
    dir.join(format!("{}-{index}.{ext}", direction.prefix()))
}

/// Header and pixel files of an image stored under `stem`.
pub fn image_paths(stem: &Path) -> (PathBuf, PathBuf) {
    let stem = stem.as_os_str().to_string_lossy();
    (
        PathBuf::from(format!("{stem}.image.json")),
        PathBuf::from(format!("{stem}.image.data")),
    )
}

fn image_stem(dir: &Path, direction: SlotDirection, index: usize) -> PathBuf {
    dir.join(format!("{}-{index}", direction.prefix()))
}

pub async fn write_image(stem: &Path, image: &Image) -> Result<(), PipelineError> {
    let (header, data) = image_paths(stem);
    tokio::fs::write(&header, serde_json::to_vec_pretty(image)?).await?;
    tokio::fs::write(&data, &image.data).await?;
    Ok(())
}

pub async fn read_image(stem: &Path) -> Result<Image, PipelineError> {
    let (header, data) = image_paths(stem);
    let mut image: Image = serde_json::from_slice(&read_required(&header).await?)?;
    image.data = read_required(&data).await?;
    image.validate()?;
    Ok(image)
}

async fn read_required(path: &Path) -> Result<Vec<u8>, PipelineError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == IoErrorKind::NotFound => Err(PipelineError::contract(format!(
            "expected file was not produced: {}",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Write an in-memory input into its slot. File-backed payloads are passed
/// by path and need no staging.
pub async fn stage_input(dir: &Path, index: usize, payload: &TypedPayload) -> Result<(), PipelineError> {
    let path = slot_path(dir, SlotDirection::Input, index, payload.interface_type());
    match payload {
        TypedPayload::TextFile(_) | TypedPayload::BinaryFile(_) => {}
        TypedPayload::TextStream(text) => tokio::fs::write(&path, text.as_bytes()).await?,
        TypedPayload::BinaryStream(bytes) => tokio::fs::write(&path, bytes).await?,
        TypedPayload::JsonCompatible(value) => {
            tokio::fs::write(&path, serde_json::to_vec(value)?).await?
        }
        TypedPayload::Image(image) => {
            write_image(&image_stem(dir, SlotDirection::Input, index), image).await?
        }
    }
    Ok(())
}

/// Read back output slot `index` after the pipeline exited.
pub async fn collect_output(
    dir: &Path,
    index: usize,
    output: &PipelineOutput,
) -> Result<TypedPayload, PipelineError> {
    let kind = output.interface_type();
    let path = slot_path(dir, SlotDirection::Output, index, kind);
    let payload = match kind {
        InterfaceType::TextFile | InterfaceType::BinaryFile => {
            let destination = output
                .data()
                .and_then(TypedPayload::path)
                .ok_or_else(|| PipelineError::contract(format!("file output {index} has no destination")))?
                .to_path_buf();
            read_file_payload(kind, destination).await?
        }
        InterfaceType::TextStream => TypedPayload::TextStream(into_text(read_required(&path).await?)?),
        InterfaceType::BinaryStream => TypedPayload::BinaryStream(read_required(&path).await?),
        InterfaceType::JsonCompatible => {
            TypedPayload::JsonCompatible(serde_json::from_slice(&read_required(&path).await?)?)
        }
        InterfaceType::Image => {
            let image = read_image(&image_stem(dir, SlotDirection::Output, index))
                .await
                .map_err(|err| match err {
                    PipelineError::Validation(reason) => {
                        PipelineError::contract(format!("malformed image in output {index}: {reason}"))
                    }
                    other => other,
                })?;
            TypedPayload::Image(image)
        }
    };
    Ok(payload)
}

/// Load the contents of a file-backed payload from disk.
pub async fn read_file_payload(kind: InterfaceType, path: PathBuf) -> Result<TypedPayload, PipelineError> {
    let bytes = read_required(&path).await?;
    Ok(match kind {
        InterfaceType::TextFile => TypedPayload::TextFile(TextFile::new(path).with_data(into_text(bytes)?)),
        _ => TypedPayload::BinaryFile(BinaryFile::new(path).with_data(bytes)),
    })
}

fn into_text(bytes: Vec<u8>) -> Result<String, PipelineError> {
    String::from_utf8(bytes).map_err(|e| PipelineError::contract(format!("text output is not UTF-8: {e}")))
}
