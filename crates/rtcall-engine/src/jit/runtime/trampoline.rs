//! Stub entry ABI and the Full runtime call trampoline
//!
//! Generated code never calls a Full entry directly. It calls
//! `call_to_runtime` with the isolate, the entry descriptor and the address
//! of the pushed arguments; the trampoline publishes the frame to the
//! isolate, runs the entry and unpublishes the frame.
//!
//! Unwinding must never cross generated frames. A panic inside the entry is
//! caught here and parked in the isolate; the stub then runs to completion
//! and `invoke_static` resumes the panic on the Rust side.

use std::panic::{self, AssertUnwindSafe};

use crate::runtime::entry::{NativeTarget, RuntimeEntry};
use crate::runtime::frame::{NativeArguments, RuntimeFrame};
use crate::vm::isolate::Isolate;

/// Entry point signature of finalized stub code
pub type StubEntryFn = unsafe extern "C" fn(
    isolate: *mut Isolate,
    args: *const u64, // positional arguments, raw value bits
    arg_count: u64,
) -> u64; // raw value bits

/// Signature of the trampoline, as called from generated code
pub type CallToRuntimeFn =
    unsafe extern "C" fn(isolate: *mut Isolate, entry: *const RuntimeEntry, argv: *mut u64, argc: u64);

/// Call a Full runtime entry on behalf of generated code
///
/// # Safety
///
/// `isolate` must be the isolate the stub was invoked with, `entry` must be
/// kept alive by the calling code, and `argv` must point at the result slot
/// and `argc` arguments pushed by the stub.
pub unsafe extern "C" fn call_to_runtime(
    isolate: *mut Isolate,
    entry: *const RuntimeEntry,
    argv: *mut u64,
    argc: u64,
) {
    let isolate = &mut *isolate;
    let entry = &*entry;
    let argc = argc as usize;

    // After a panic the stub only unwinds its frame; skip further calls
    if isolate.has_pending_panic() {
        return;
    }

    let function = match entry.native_target() {
        NativeTarget::Full(function) => function,
        NativeTarget::Leaf(_) => {
            isolate.set_pending_panic(Box::new(format!(
                "leaf runtime entry {} called through the trampoline",
                entry.name()
            )));
            return;
        }
    };
    if argc != entry.arity() {
        isolate.set_pending_panic(Box::new(format!(
            "runtime entry {} called with {} arguments, expects {}",
            entry.name(),
            argc,
            entry.arity()
        )));
        return;
    }

    log::trace!("call_to_runtime {} ({} args)", entry.name(), argc);
    let frame = RuntimeFrame::new(entry.name(), argv, argc);
    isolate.push_runtime_frame(frame);
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut arguments = NativeArguments::new(&mut *isolate, frame);
        function(&mut arguments);
    }));
    isolate.pop_runtime_frame();

    if let Err(payload) = result {
        log::debug!("runtime entry {} panicked", entry.name());
        isolate.set_pending_panic(payload);
    }
}

/// Address of the trampoline, for embedding in generated code
pub fn call_to_runtime_address() -> usize {
    let f: CallToRuntimeFn = call_to_runtime;
    f as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::registry::RuntimeEntryRegistry;
    use crate::vm::value::Value;
    use std::sync::Arc;

    fn isolate() -> Isolate {
        Isolate::new(Arc::new(RuntimeEntryRegistry::with_builtins()))
    }

    #[test]
    fn test_trampoline_writes_result_slot() {
        let mut iso = isolate();
        let sub = iso.registry().lookup("TestSmiSub");
        let mut words = [Value::smi(20).to_bits(), Value::smi(10).to_bits(), Value::null().to_bits()];

        unsafe { call_to_runtime(&mut iso, Arc::as_ptr(&sub), words.as_mut_ptr(), 2) };

        assert_eq!(Value::from_bits(words[2]), Value::smi(-10));
        assert_eq!(iso.runtime_frame_depth(), 0);
        assert!(!iso.has_pending_panic());
    }

    #[test]
    fn test_trampoline_parks_panics() {
        let mut iso = isolate();
        let sub = iso.registry().lookup("TestSmiSub");
        // null is not an integer
        let mut words = [Value::smi(1).to_bits(), Value::null().to_bits(), Value::null().to_bits()];

        unsafe { call_to_runtime(&mut iso, Arc::as_ptr(&sub), words.as_mut_ptr(), 2) };

        assert_eq!(iso.runtime_frame_depth(), 0);
        let payload = iso.take_pending_panic().unwrap();
        let message = payload.downcast_ref::<String>().unwrap();
        assert!(message.contains("expected an integer"));
    }

    #[test]
    fn test_trampoline_rejects_wrong_argc() {
        let mut iso = isolate();
        let sub = iso.registry().lookup("TestSmiSub");
        let mut words = [Value::null().to_bits()];

        unsafe { call_to_runtime(&mut iso, Arc::as_ptr(&sub), words.as_mut_ptr(), 0) };
        assert!(iso.has_pending_panic());
    }
}
