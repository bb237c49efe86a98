/// One unit of code: instruction words and the constant pools they index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeBlock {
    /// Diagnostic only.
    pub name: String,
    pub code: Vec<i64>,
    pub strings: Vec<Vec<u8>>,
    pub floats: Vec<f64>,
}

impl CodeBlock {
    pub fn new(name: impl Into<String>, code: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            code,
            strings: Vec::new(),
            floats: Vec::new(),
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

/// A loaded program. Immutable once execution starts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeImage {
    pub blocks: Vec<CodeBlock>,
    /// First block to execute.
    pub entry: usize,
}

impl CodeImage {
    pub fn new(blocks: Vec<CodeBlock>, entry: usize) -> Self {
        Self { blocks, entry }
    }

    #[inline(always)]
    pub fn block(&self, id: usize) -> Option<&CodeBlock> {
        self.blocks.get(id)
    }
}
