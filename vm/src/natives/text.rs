use object::{Array, HeapObject, ObjectError, ObjectKind, Slot, Str};

use crate::{NativeContext, RuntimeError};

pub fn text_integer(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let value = ctx.scalar(0)?;
    Ok(Some(ctx.new_string(value.to_string())))
}

pub fn text_real(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let value = ctx.float(0)?;
    Ok(Some(ctx.new_string(format!("{value:.6}"))))
}

pub fn text_char(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let value = ctx.scalar(0)? as u8;
    Ok(Some(ctx.new_string(vec![value])))
}

pub fn text_boolean(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let text = if ctx.scalar(0)? != 0 { "true" } else { "false" };
    Ok(Some(ctx.new_string(text)))
}

pub fn length_text(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let len = ctx.string(0)?.len();
    Ok(Some(Slot::Scalar(len as i64)))
}

// ── Array rendering ───────────────────────────────────────────────

pub fn text_array_of_char(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let bytes: Vec<u8> = ctx
        .basic_array(0)?
        .items()
        .iter()
        .map(|&item| item as u8)
        .collect();
    Ok(Some(ctx.new_string(bytes)))
}

/// Renders `[1, 2, 3]`. Booleans share this rendering.
pub fn text_array_of_integer(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let items: Vec<String> = ctx
        .basic_array(0)?
        .items()
        .iter()
        .map(i64::to_string)
        .collect();
    Ok(Some(ctx.new_string(format!("[{}]", items.join(", ")))))
}

pub fn text_array_of_text(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let mut text = vec![b'['];
    for (i, &item) in ctx.array(0)?.items().iter().enumerate() {
        if i > 0 {
            text.extend_from_slice(b", ");
        }
        text.extend_from_slice(ctx.heap.string(item)?.as_bytes());
    }
    text.push(b']');
    Ok(Some(ctx.new_string(text)))
}

// ── Building ──────────────────────────────────────────────────────

/// Appends in place when the left string is only owned by the argument slot.
pub fn concat_text(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let left = ctx.handle(0)?;
    let right = ctx.string(1)?.as_bytes().to_vec();
    if ctx.heap.ref_count(left)? == 1 {
        ctx.heap.string_mut(left)?.push_bytes(&right);
        return ctx.retained(left).map(Some);
    }
    let mut bytes = ctx.string(0)?.as_bytes().to_vec();
    bytes.extend_from_slice(&right);
    Ok(Some(ctx.new_string(bytes)))
}

fn substring(bytes: &[u8], index: i64, len: i64) -> Vec<u8> {
    let start = index.clamp(0, bytes.len() as i64) as usize;
    let end = start.saturating_add(len.max(0) as usize).min(bytes.len());
    bytes[start..end].to_vec()
}

pub fn subtext(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let index = ctx.scalar(1)?;
    let len = ctx.scalar(2)?;
    let bytes = substring(ctx.string(0)?.as_bytes(), index, len);
    Ok(Some(ctx.new_string(bytes)))
}

pub fn subtext_to_end(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let index = ctx.scalar(1)?;
    let bytes = substring(ctx.string(0)?.as_bytes(), index, i64::MAX);
    Ok(Some(ctx.new_string(bytes)))
}

pub fn trim_integer(_ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Err(RuntimeError::NotImplemented {
        name: "Trim_Integer",
    })
}

pub fn split_text(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let text = ctx.string(0)?.as_bytes().to_vec();
    let separator = ctx.string(1)?.as_bytes().to_vec();
    let parts = split(&text, &separator);
    let items = parts
        .into_iter()
        .map(|part| ctx.heap.add(HeapObject::Str(Str::new(part))))
        .collect();
    Ok(Some(Slot::Handle(ctx.heap.add(HeapObject::Array(Array::new(items))))))
}

/// Always yields at least one part. An empty separator does not split.
fn split(text: &[u8], separator: &[u8]) -> Vec<Vec<u8>> {
    if separator.is_empty() {
        return vec![text.to_vec()];
    }
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(at) = find(rest, separator) {
        parts.push(rest[..at].to_vec());
        rest = &rest[at + separator.len()..];
    }
    parts.push(rest.to_vec());
    parts
}

// ── Queries ───────────────────────────────────────────────────────

pub fn char_code(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let index = ctx.scalar(1)?;
    let bytes = ctx.string(0)?.as_bytes();
    let byte = usize::try_from(index)
        .ok()
        .and_then(|i| bytes.get(i))
        .ok_or(ObjectError::InvalidOffset {
            kind: ObjectKind::Str,
            offset: index,
            size: bytes.len(),
        })?;
    Ok(Some(Slot::Scalar(i64::from(*byte))))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

pub fn index_of_char(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let needle = ctx.scalar(0)? as u8;
    let index = ctx
        .string(1)?
        .as_bytes()
        .iter()
        .position(|&byte| byte == needle)
        .map_or(-1, |i| i as i64);
    Ok(Some(Slot::Scalar(index)))
}

pub fn index_of_text(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let needle = ctx.string(0)?.as_bytes();
    let haystack = ctx.string(1)?.as_bytes();
    let index = find(haystack, needle).map_or(-1, |i| i as i64);
    Ok(Some(Slot::Scalar(index)))
}

/// Leading integer of the text, 0 when there is none.
pub fn integer_text(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let value = parse_leading_integer(ctx.string(0)?.as_bytes());
    Ok(Some(Slot::Scalar(value)))
}

fn parse_leading_integer(bytes: &[u8]) -> i64 {
    let mut rest = bytes.trim_ascii_start();
    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };
    let magnitude = rest
        .iter()
        .take_while(|byte| byte.is_ascii_digit())
        .fold(0i64, |acc, &digit| {
            acc.wrapping_mul(10).wrapping_add(i64::from(digit - b'0'))
        });
    if negative { magnitude.wrapping_neg() } else { magnitude }
}
