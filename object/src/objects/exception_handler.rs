/// Control marker pushed by `CREATE_EXCEPTION_HANDLER`.
///
/// Holds the resume point of a handler: the code block, the absolute
/// instruction offset and the base pointer of the frame that installed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub code_block: usize,
    pub ip: usize,
    pub bp: usize,
}

impl ExceptionHandler {
    pub fn new(code_block: usize, ip: usize, bp: usize) -> Self {
        Self { code_block, ip, bp }
    }
}
