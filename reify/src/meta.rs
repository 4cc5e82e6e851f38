//! Runtime entry points for loading, releasing and instrumenting code.

use std::sync::Arc;

use log::{debug, error};

use crate::{
    CLOSURE_TAG, CodeBuffer, CodeFragment, CodeRegistry, CodeSettings, DebugInfo, Digest,
    Dispatch, ExecutionMode, InterpreterStack, ManagedHeap, MetaError, Result, Root,
    SpliceLayout, TracedCall, Value, fixup_endianness, globals, thread_code, trampoline,
};

/// Identifies a unit produced by [`Meta::reify_bytecode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BytecodeHandle {
    pub start: usize,
    pub len: usize,
}

impl BytecodeHandle {
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// A freshly loaded unit together with a closure over its entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReifiedCode {
    pub bytecode: BytecodeHandle,
    /// Closure block whose only field is the entry address. Not rooted: the
    /// caller must store it before the next allocation.
    pub closure: Value,
}

pub struct Meta {
    settings: CodeSettings,
    registry: CodeRegistry,
    debug_info: Arc<dyn DebugInfo>,
}

impl Meta {
    pub fn new(settings: CodeSettings, debug_info: Arc<dyn DebugInfo>) -> Result<Self> {
        settings.validate().map_err(MetaError::InvalidSettings)?;
        let registry = CodeRegistry::new(settings.initial_fragment_capacity);
        Ok(Self {
            settings,
            registry,
            debug_info,
        })
    }

    pub fn settings(&self) -> &CodeSettings {
        &self.settings
    }

    /// The fragment registry, shared with whoever resolves code addresses.
    pub fn registry(&self) -> &CodeRegistry {
        &self.registry
    }

    fn bytecode_only(&self, operation: &'static str) -> Result<()> {
        match self.settings.mode {
            ExecutionMode::Bytecode => Ok(()),
            ExecutionMode::Native => Err(MetaError::Unsupported { operation }),
        }
    }

    /// Turns the concatenation of `chunks` into an executable unit.
    ///
    /// The bytes are copied into a buffer owned by the registry, debug info
    /// is attached, the code is brought into host byte order and threaded
    /// if the interpreter uses threaded dispatch, and a closure over the
    /// entry point is allocated on `heap`.
    pub fn reify_bytecode(
        &self,
        heap: &mut dyn ManagedHeap,
        chunks: &[&[u8]],
        debug: Value,
    ) -> Result<ReifiedCode> {
        self.bytecode_only("Meta.reify_bytecode")?;

        let mut code = CodeBuffer::assemble(chunks)?;
        let bytecode = BytecodeHandle {
            start: code.start(),
            len: code.len(),
        };
        self.debug_info.attach(bytecode.start, bytecode.len, debug);

        fixup_endianness(code.words_mut(), self.settings.byte_order);
        if let Dispatch::Threaded(table) = &self.settings.dispatch {
            thread_code(code.words_mut(), table);
        }

        self.registry
            .lock()
            .register(Arc::new(CodeFragment::loaded(code)));

        let closure = heap.allocate_block(1, CLOSURE_TAG);
        heap.initialize_field(closure, 0, Value::from_code_addr(bytecode.start));

        Ok(ReifiedCode { bytecode, closure })
    }

    /// Releases a unit produced by [`Meta::reify_bytecode`].
    ///
    /// Releasing a handle twice, one that was never produced, or one that
    /// names a trusted fragment is a protocol violation reported as
    /// [`MetaError::UnknownFragment`]. The registry is left untouched.
    pub fn release_bytecode(&self, handle: BytecodeHandle) -> Result<()> {
        self.bytecode_only("Meta.static_release_bytecode")?;

        let (start, end) = (handle.start, handle.end());
        self.debug_info.detach(start);

        let removed = {
            let mut registry = self.registry.lock();
            let fragment = registry
                .find_exact(start, end)
                .filter(|cf| cf.code().is_some())
                .cloned();
            fragment.and_then(|cf| registry.unregister(&cf))
        };
        match removed {
            Some(fragment) => {
                debug!("released bytecode [{start:#x}, {end:#x})");
                drop(fragment);
                Ok(())
            }
            None => {
                error!("release of unregistered bytecode [{start:#x}, {end:#x})");
                Err(MetaError::UnknownFragment { start, end })
            }
        }
    }

    /// Registers code the runtime does not own. Nothing is copied and the
    /// range is never freed by this crate.
    pub fn register_code_fragment(&self, start: usize, len: usize, digest: Digest) {
        self.registry
            .lock()
            .register(Arc::new(CodeFragment::trusted(start, len, digest)));
    }

    /// Grows the global table to hold at least `requested` slots.
    pub fn realloc_global(&self, heap: &mut dyn ManagedHeap, requested: usize) -> Result<()> {
        self.bytecode_only("Meta.realloc_global")?;
        globals::realloc_global(heap, requested, self.settings.global_granularity);
        Ok(())
    }

    /// The current global table.
    pub fn global_data(&self, heap: &dyn ManagedHeap) -> Result<Value> {
        self.bytecode_only("Meta.get_global_data")?;
        Ok(heap.read_root(Root::GlobalData))
    }

    pub fn section_table(&self) -> Result<&[u8]> {
        self.bytecode_only("Meta.get_section_table")?;
        self.settings
            .section_table
            .as_deref()
            .ok_or(MetaError::NotFound)
    }

    pub fn invoke_traced_function(
        &self,
        stack: &mut InterpreterStack,
        call: TracedCall,
    ) -> Result<()> {
        self.bytecode_only("Meta.invoke_traced_function")?;
        trampoline::invoke_traced_function(stack, call, SpliceLayout::default())
    }

    pub fn current_environment(&self, stack: &InterpreterStack) -> Result<Value> {
        self.bytecode_only("Meta.get_current_environment")?;
        trampoline::current_environment(stack).ok_or(MetaError::NotFound)
    }
}

impl std::fmt::Debug for Meta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meta")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
