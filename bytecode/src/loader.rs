use std::path::Path;

use log::info;

use crate::image::{CodeBlock, CodeImage};

#[derive(Debug)]
pub enum ImageError {
    Io(std::io::Error),
    UnexpectedEof,
    InvalidNumber { token: String },
    InvalidLength { length: i64 },
}

impl ImageError {
    pub fn kind(&self) -> &'static str {
        match self {
            ImageError::Io(_) => "FileNotFound",
            ImageError::UnexpectedEof => "EndOfFile",
            ImageError::InvalidNumber { .. } => "InvalidNumber",
            ImageError::InvalidLength { .. } => "InvalidLength",
        }
    }
}

impl std::fmt::Display for ImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageError::Io(err) => write!(f, "{err}"),
            ImageError::UnexpectedEof => write!(f, "Unexpected end of file"),
            ImageError::InvalidNumber { token } => write!(f, "Invalid number '{token}'"),
            ImageError::InvalidLength { length } => write!(f, "Invalid length {length}"),
        }
    }
}

impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImageError {
    fn from(err: std::io::Error) -> Self {
        ImageError::Io(err)
    }
}

pub fn load_image(path: impl AsRef<Path>) -> Result<CodeImage, ImageError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let image = parse_image(&bytes)?;
    info!(
        "loaded {} code blocks from {}, entry {}",
        image.blocks.len(),
        path.display(),
        image.entry
    );
    Ok(image)
}

/// Parses the whitespace-separated text image format:
///
/// ```text
/// blockCount entryBlockId
/// ( name strCount str* floatCount float* codeCount word* )*
/// ```
///
/// Strings (including block names) are a length followed by a single blank
/// and then exactly that many raw bytes.
pub fn parse_image(bytes: &[u8]) -> Result<CodeImage, ImageError> {
    let mut reader = Reader::new(bytes);
    let block_count = reader.next_len()?;
    let entry = reader.next_len()?;
    let mut blocks = Vec::with_capacity(block_count);
    for _ in 0..block_count {
        blocks.push(read_block(&mut reader)?);
    }
    Ok(CodeImage::new(blocks, entry))
}

fn read_block(reader: &mut Reader<'_>) -> Result<CodeBlock, ImageError> {
    let name = String::from_utf8_lossy(&reader.next_string()?).into_owned();

    let string_count = reader.next_len()?;
    let strings = (0..string_count)
        .map(|_| reader.next_string())
        .collect::<Result<Vec<_>, _>>()?;

    let float_count = reader.next_len()?;
    let floats = (0..float_count)
        .map(|_| reader.next_float())
        .collect::<Result<Vec<_>, _>>()?;

    let code_count = reader.next_len()?;
    let code = (0..code_count)
        .map(|_| reader.next_int())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CodeBlock {
        name,
        code,
        strings,
        floats,
    })
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn is_blank(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Reads the next non-blank token and consumes the blank that ends it.
    fn next_token(&mut self) -> Result<&'a str, ImageError> {
        while self.pos < self.bytes.len() && is_blank(self.bytes[self.pos]) {
            self.pos += 1;
        }
        let start = self.pos;
        while self.pos < self.bytes.len() && !is_blank(self.bytes[self.pos]) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(ImageError::UnexpectedEof);
        }
        let token = &self.bytes[start..self.pos];
        if self.pos < self.bytes.len() {
            self.pos += 1;
        }
        std::str::from_utf8(token).map_err(|_| ImageError::InvalidNumber {
            token: String::from_utf8_lossy(token).into_owned(),
        })
    }

    fn next_int(&mut self) -> Result<i64, ImageError> {
        let token = self.next_token()?;
        token.parse().map_err(|_| ImageError::InvalidNumber {
            token: token.to_owned(),
        })
    }

    fn next_len(&mut self) -> Result<usize, ImageError> {
        let length = self.next_int()?;
        usize::try_from(length).map_err(|_| ImageError::InvalidLength { length })
    }

    fn next_float(&mut self) -> Result<f64, ImageError> {
        let token = self.next_token()?;
        token.parse().map_err(|_| ImageError::InvalidNumber {
            token: token.to_owned(),
        })
    }

    fn next_string(&mut self) -> Result<Vec<u8>, ImageError> {
        let len = self.next_len()?;
        let end = self.pos.checked_add(len).ok_or(ImageError::UnexpectedEof)?;
        let bytes = self.bytes.get(self.pos..end).ok_or(ImageError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes.to_vec())
    }
}
