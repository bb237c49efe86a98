use object::{Array, BasicArray, HeapObject, Slot};

use crate::{NativeContext, RuntimeError};

pub fn length_basic_array(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::Scalar(ctx.basic_array(0)?.len() as i64)))
}

pub fn last_index_basic_array(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::Scalar(ctx.basic_array(0)?.len() as i64 - 1)))
}

pub fn length_array(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::Scalar(ctx.array(0)?.len() as i64)))
}

pub fn last_index_array(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::Scalar(ctx.array(0)?.len() as i64 - 1)))
}

// ── Search ────────────────────────────────────────────────────────

/// Structural search: `(item, array) -> index or -1`.
fn position_in_array(ctx: &NativeContext) -> Result<i64, RuntimeError> {
    let item = ctx.handle(0)?;
    for (i, &element) in ctx.array(1)?.items().iter().enumerate() {
        if ctx.heap.compare(item, element)? {
            return Ok(i as i64);
        }
    }
    Ok(-1)
}

fn position_in_basic_array(ctx: &NativeContext) -> Result<i64, RuntimeError> {
    let item = ctx.scalar(0)?;
    Ok(ctx
        .basic_array(1)?
        .items()
        .iter()
        .position(|&element| element == item)
        .map_or(-1, |i| i as i64))
}

pub fn index_of_array(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::Scalar(position_in_array(ctx)?)))
}

pub fn index_of_basic_array(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::Scalar(position_in_basic_array(ctx)?)))
}

pub fn in_array(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::from_bool(position_in_array(ctx)? != -1)))
}

pub fn in_basic_array(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::from_bool(position_in_basic_array(ctx)? != -1)))
}

// ── Slicing ───────────────────────────────────────────────────────

/// `[begin, end]` with an inclusive end, clamped to `len`.
fn slice_bounds(len: usize, begin: i64, end: i64) -> (usize, usize) {
    let begin = begin.clamp(0, len as i64) as usize;
    let end = end.saturating_add(1).clamp(begin as i64, len as i64) as usize;
    (begin, end)
}

pub fn slice_basic_array(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let (begin, end) = (ctx.scalar(1)?, ctx.scalar(2)?);
    let items = ctx.basic_array(0)?.items();
    let (begin, end) = slice_bounds(items.len(), begin, end);
    let slice = BasicArray::new(items[begin..end].to_vec());
    Ok(Some(Slot::Handle(ctx.heap.add(HeapObject::BasicArray(slice)))))
}

pub fn slice_array(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let (begin, end) = (ctx.scalar(1)?, ctx.scalar(2)?);
    let items = ctx.array(0)?.items();
    let (begin, end) = slice_bounds(items.len(), begin, end);
    let items = items[begin..end].to_vec();
    for &item in &items {
        ctx.heap.inc(item)?;
    }
    Ok(Some(Slot::Handle(ctx.heap.add(HeapObject::Array(Array::new(items))))))
}

// ── Concatenation ─────────────────────────────────────────────────

/// Appends in place when the left array is only owned by the argument slot.
pub fn concat_basic_array(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let left = ctx.handle(0)?;
    let right = ctx.basic_array(1)?.items().to_vec();
    if ctx.heap.ref_count(left)? == 1 {
        ctx.heap.basic_array_mut(left)?.extend_from_slice(&right);
        return ctx.retained(left).map(Some);
    }
    let mut items = ctx.basic_array(0)?.items().to_vec();
    items.extend_from_slice(&right);
    Ok(Some(Slot::Handle(ctx.heap.add(HeapObject::BasicArray(BasicArray::new(items))))))
}

pub fn concat_array(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let left = ctx.handle(0)?;
    let right = ctx.array(1)?.items().to_vec();
    for &item in &right {
        ctx.heap.inc(item)?;
    }
    if ctx.heap.ref_count(left)? == 1 {
        ctx.heap.array_mut(left)?.extend_from_slice(&right);
        return ctx.retained(left).map(Some);
    }
    let mut items = ctx.array(0)?.items().to_vec();
    for &item in &items {
        ctx.heap.inc(item)?;
    }
    items.extend_from_slice(&right);
    Ok(Some(Slot::Handle(ctx.heap.add(HeapObject::Array(Array::new(items))))))
}
