//! Temporary stack (§4.6): every temporary requiring destruction is pushed
//! here as it is created; `destroy_down_to` pops and destroys back to a
//! marker in reverse order, both on normal scope exit and when unwinding
//! through a `catch` landing pad. This is the exception-safety mechanism the
//! teacher's closure/scope machinery does not need (Y-lang has no `try`) but
//! Clay's `try`/`catch`/temporary-destructor story requires (§4.6, §8).

use inkwell::values::{FunctionValue, PointerValue};

struct TempSlot<'ctx> {
    slot: PointerValue<'ctx>,
    destructor: Option<FunctionValue<'ctx>>,
}

#[derive(Default)]
pub struct TempStack<'ctx> {
    entries: Vec<TempSlot<'ctx>>,
}

/// Opaque position in the stack; `destroy_down_to` unwinds everything pushed
/// after the marker was taken.
#[derive(Clone, Copy)]
pub struct Marker(usize);

impl<'ctx> TempStack<'ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) -> Marker {
        Marker(self.entries.len())
    }

    /// Registers `slot` (an alloca holding a temporary) for destruction when
    /// the enclosing marker unwinds. `destructor` is `None` for types with no
    /// user-defined or compiler-synthesized destructor (§4.6: destruction is
    /// a no-op for types without one).
    pub fn push(&mut self, slot: PointerValue<'ctx>, destructor: Option<FunctionValue<'ctx>>) {
        self.entries.push(TempSlot { slot, destructor });
    }

    /// Emits a destructor call for every temporary pushed after `marker`, in
    /// reverse (most-recently-created-first) order, then drops them from the
    /// stack. Called both at normal block exit and at the top of a landing
    /// pad (§4.6's exception-safe unwind).
    pub fn destroy_down_to<'r>(&mut self, ctx: &super::CodegenContext<'ctx, 'r>, marker: Marker) {
        while self.entries.len() > marker.0 {
            let TempSlot { slot, destructor } = self.entries.pop().unwrap();
            if let Some(destructor) = destructor {
                ctx.builder
                    .build_call(destructor, &[slot.into()], "destroy")
                    .unwrap();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::CodegenContext;
    use crate::resolver::GlobalInvokeTables;
    use crate::types::TypeRegistry;
    use inkwell::context::Context as LlvmContext;

    #[test]
    fn destroy_down_to_pops_everything_pushed_after_the_marker() {
        let llvm = LlvmContext::create();
        let registry = TypeRegistry::new();
        let tables = GlobalInvokeTables::new();
        let ctx = CodegenContext::new(&llvm, "test", &registry, &tables);

        let void_ty = llvm.void_type();
        let ptr_ty = llvm.ptr_type(inkwell::AddressSpace::default());
        let destructor = ctx.module.add_function("destroy_it", void_ty.fn_type(&[ptr_ty.into()], false), None);
        let host = ctx.module.add_function("host", void_ty.fn_type(&[], false), None);
        let block = llvm.append_basic_block(host, "entry");
        ctx.builder.position_at_end(block);

        let mut stack = TempStack::new();
        let marker = stack.mark();
        assert_eq!(marker.0, 0);

        let slot_a = ctx.builder.build_alloca(llvm.i32_type(), "a").unwrap();
        let slot_b = ctx.builder.build_alloca(llvm.i32_type(), "b").unwrap();
        stack.push(slot_a, Some(destructor));
        stack.push(slot_b, None);
        assert_eq!(stack.entries.len(), 2);

        stack.destroy_down_to(&ctx, marker);
        assert_eq!(stack.entries.len(), 0);
    }

    #[test]
    fn marking_after_a_push_only_unwinds_entries_pushed_later() {
        let llvm = LlvmContext::create();
        let registry = TypeRegistry::new();
        let tables = GlobalInvokeTables::new();
        let ctx = CodegenContext::new(&llvm, "test", &registry, &tables);

        let void_ty = llvm.void_type();
        let host = ctx.module.add_function("host", void_ty.fn_type(&[], false), None);
        let block = llvm.append_basic_block(host, "entry");
        ctx.builder.position_at_end(block);

        let mut stack = TempStack::new();
        let slot_a = ctx.builder.build_alloca(llvm.i32_type(), "a").unwrap();
        stack.push(slot_a, None);

        let marker = stack.mark();
        let slot_b = ctx.builder.build_alloca(llvm.i32_type(), "b").unwrap();
        stack.push(slot_b, None);

        stack.destroy_down_to(&ctx, marker);
        assert_eq!(stack.entries.len(), 1);
    }
}
