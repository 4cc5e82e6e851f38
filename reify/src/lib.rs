mod code;
mod config;
mod debug_info;
mod error;
mod fragment;
mod frame;
mod globals;
mod heap;
mod meta;
mod opcode;
mod stack;
mod table;
mod trampoline;
mod value;

pub use code::{ByteOrder, CodeBuffer, DispatchTable, fixup_endianness, thread_code};
pub use config::{CodeSettings, Dispatch, ExecutionMode};
pub use debug_info::{DebugEntry, DebugInfo, DebugInfoTable};
pub use error::{MetaError, Result};
pub use fragment::{CodeFragment, CodeRegistry, Digest, FragmentKind, FragmentRef, FragmentRegistry};
pub use frame::{FRAME_LAYOUT_VERSION, ReturnFrame};
pub use globals::{GLOBAL_DATA_TAG, global_size, init_global_data, rounded_size};
pub use heap::{ArenaHeap, CLOSURE_TAG, ManagedHeap, Root};
pub use meta::{BytecodeHandle, Meta, ReifiedCode};
pub use opcode::{Op, switch_cases};
pub use stack::InterpreterStack;
pub use table::{EntryHandle, GrowableTable, Release};
pub use trampoline::{SpliceLayout, TracedCall};
pub use value::Value;
