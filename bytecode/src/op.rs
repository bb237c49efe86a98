/// Highest opcode that is encoded without an immediate word.
///
/// Anything above it is followed by exactly one argument word.
pub const OPCODE_NO_ARG_MAX: i64 = 99;

macro_rules! opcodes {
    ($($(#[$doc:meta])* $name:ident = $code:literal,)*) => {
        /// Bytecode opcodes.
        ///
        /// Each instruction is one 64-bit word, plus one immediate word for
        /// opcodes above [`OPCODE_NO_ARG_MAX`]. Jump targets are absolute
        /// word offsets into the current block.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Op {
            $($(#[$doc])* $name = $code,)*
        }

        impl Op {
            pub const ALL: &'static [Op] = &[$(Op::$name,)*];

            pub const fn name(self) -> &'static str {
                match self {
                    $(Op::$name => stringify!($name),)*
                }
            }
        }

        impl TryFrom<i64> for Op {
            type Error = i64;

            fn try_from(word: i64) -> Result<Self, i64> {
                match word {
                    $($code => Ok(Op::$name),)*
                    other => Err(other),
                }
            }
        }
    };
}

opcodes! {
    /// Log the machine registers. No stack effect.
    Debug = 1,
    Dup = 2,
    Swap = 3,
    Add = 4,
    AddF = 5,
    Sub = 6,
    SubF = 7,
    /// Integer division. Division by zero raises error code 0.
    Div = 8,
    DivF = 9,
    /// Integer remainder. Division by zero raises error code 0.
    Rem = 10,
    Mul = 11,
    MulF = 12,
    Neg = 13,
    NegF = 14,
    Gt = 15,
    GtF = 16,
    Lt = 17,
    LtF = 18,
    Gte = 19,
    GteF = 20,
    Lte = 21,
    LteF = 22,
    And = 23,
    Or = 24,
    Not = 25,
    Eq = 26,
    EqF = 27,
    /// Structural compare of two handles. Both are released.
    EqRef = 28,
    Ne = 29,
    NeF = 30,
    /// `[container, offset] -> [element]`
    PushPtrOffset = 31,
    /// Like [`PushPtrOffset`](Op::PushPtrOffset) but makes the element
    /// mutable in place first.
    PushPtrOffsetForMutate = 32,
    /// `[container, offset, value] -> []`
    PopPtrOffset = 33,
    /// Raise the error code on top of the stack.
    Raise = 34,
    RetVal = 35,
    Ret = 36,
    Yield = 37,
    YieldDone = 38,
    /// Resume the generator on top of the stack.
    Next = 39,
    Ended = 40,
    BasicArrayTimes = 41,
    ArrayTimes = 42,
    /// `[s1..sn, n] -> [s]`
    ConcatString = 43,
    /// `[v1..vn, n] -> [blob]`
    CreateBlob = 44,
    /// `[blob, offset, n] -> [v1..vn]`
    ReadBlob = 45,
    /// `[blob, offset, v1..vn, n] -> []`
    WriteBlob = 46,
    /// `[b1..bn, n] -> [blob]`
    ConcatBlob = 47,
    /// `[blob, offset] -> [handle]`
    GetBlobMutableOffset = 48,
    GetBlobSize = 49,
    /// `[v1..vk, blob, k] -> [index]`
    GetBlobIndexOfItem = 50,
    /// `[blob, begin, end] -> [blob]`
    SliceBlob = 51,
    /// `[v1..vk, count, k] -> [blob]`
    CreateBlobRepeatItem = 52,

    Jz = 100,
    Jnz = 101,
    Jmp = 102,
    Push = 103,
    PushGlobal = 104,
    PushGlobalForMutate = 105,
    PushLocal = 106,
    PushLocalForMutate = 107,
    /// Push the absolute stack index `bp + arg`.
    PushIndirection = 108,
    PushIndirect = 109,
    PushIndirectForMutate = 110,
    PopGlobal = 111,
    PopLocal = 112,
    PopIndirect = 113,
    /// Drop `arg` slots.
    PopVoid = 114,
    /// Push string constant `arg` of the current block.
    CreateString = 115,
    CreateRecord = 116,
    CreateBasicArray = 117,
    CreateArray = 118,
    Call = 119,
    CallAbstract = 120,
    CallNative = 121,
    InitGenerator = 122,
    CreateExceptionHandler = 123,
}

impl Op {
    /// Whether an immediate word follows the opcode.
    #[inline(always)]
    pub const fn has_argument(self) -> bool {
        self as i64 > OPCODE_NO_ARG_MAX
    }

    #[inline(always)]
    pub const fn code(self) -> i64 {
        self as i64
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
