//! Uniform call path into generated code

use std::panic;
use std::sync::Arc;

use crate::vm::function::Function;
use crate::vm::isolate::Isolate;
use crate::vm::value::Value;

/// Invoke a static function with positional `arguments`
///
/// The call runs inside its own zone. The result is rooted in the caller's
/// zone before it is returned. A panic raised by a runtime entry during the
/// call is resumed here, once the stub has returned.
///
/// # Panics
///
/// Panics if any named argument is given, if the positional count does not
/// match the function's parameter count, or if the function has no code.
pub fn invoke_static(
    isolate: &mut Isolate,
    function: &Arc<Function>,
    arguments: &[Value],
    argument_names: &[&str],
) -> Value {
    assert!(
        argument_names.is_empty(),
        "{} takes no named arguments, got {:?}",
        function.name(),
        argument_names
    );
    assert_eq!(
        arguments.len(),
        function.param_count(),
        "{} expects {} arguments, got {}",
        function.name(),
        function.param_count(),
        arguments.len()
    );
    let code = function
        .code()
        .unwrap_or_else(|| panic!("{} has no code", function.name()))
        .clone();

    let frames_before = isolate.runtime_frame_depth();
    let bits = isolate.with_zone(|isolate| {
        for &arg in arguments {
            isolate.new_handle(arg);
        }
        let raw: Vec<u64> = arguments.iter().map(|v| v.to_bits()).collect();
        log::trace!("invoking {} with {} arguments", function.name(), raw.len());

        let entry = code.entry();
        let isolate_ptr: *mut Isolate = isolate;
        // Safety: the code was finalized against this isolate's stub ABI and
        // `raw` outlives the call
        unsafe { entry(isolate_ptr, raw.as_ptr(), raw.len() as u64) }
    });

    if let Some(payload) = isolate.take_pending_panic() {
        panic::resume_unwind(payload);
    }
    assert_eq!(
        isolate.runtime_frame_depth(),
        frames_before,
        "{} left runtime frames behind",
        function.name()
    );

    isolate.new_handle(Value::from_bits(bits))
}
