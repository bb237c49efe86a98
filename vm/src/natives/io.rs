use object::Slot;

use crate::{NativeContext, RuntimeError};

pub fn get_char(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let mut byte = [0u8; 1];
    let read = ctx.input.read(&mut byte)?;
    // end of input reads as -1
    let code = if read == 0 { -1 } else { i64::from(byte[0]) };
    Ok(Some(Slot::Scalar(code)))
}

pub fn write_text(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let handle = ctx.handle(0)?;
    let text = ctx.heap.string(handle)?.as_bytes();
    ctx.output.write_all(text)?;
    ctx.output.flush()?;
    Ok(None)
}

pub fn print_text(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let handle = ctx.handle(0)?;
    let text = ctx.heap.string(handle)?.as_bytes();
    ctx.output.write_all(text)?;
    ctx.output.write_all(b"\n")?;
    ctx.output.flush()?;
    Ok(None)
}

pub fn print_text_func(_ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Err(RuntimeError::NotImplemented {
        name: "Print_Text_Func",
    })
}
