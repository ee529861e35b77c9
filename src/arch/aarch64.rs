//! aarch64 implementation of context switching

use std::arch::naked_asm;

/// Saved CPU context for a thread
///
/// On aarch64 (AAPCS64), these are the callee-saved registers
/// that must be preserved across function calls:
/// - x19-x28: general purpose callee-saved registers
/// - d8-d15: floating-point/SIMD callee-saved registers (lower 64 bits of v8-v15)
#[repr(C)]
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Stack pointer
    sp: u64,
    /// Link register (return address)
    lr: u64,
    /// Frame pointer
    fp: u64,
    /// General purpose (callee-saved)
    x19: u64,
    x20: u64,
    x21: u64,
    x22: u64,
    x23: u64,
    x24: u64,
    x25: u64,
    x26: u64,
    x27: u64,
    x28: u64,
    /// Floating-point/SIMD (callee-saved, lower 64 bits)
    d8: u64,
    d9: u64,
    d10: u64,
    d11: u64,
    d12: u64,
    d13: u64,
    d14: u64,
    d15: u64,
}

impl Context {
    /// Create the initial context for a fresh thread.
    ///
    /// - `stack_top`: top of the allocated stack (highest address), 16-byte aligned
    /// - `entry`: address of the start shim ([`thread_start`])
    /// - `tcb`: control-block pointer, read back by the shim
    ///
    /// On aarch64, `ret` jumps to the address in lr, so the entry address
    /// goes in the link register rather than on the stack. The two words
    /// at the top of the stack hold the start-up signature: the
    /// control-block reference and a null sentinel return address that
    /// must never be executed. x19 carries a spare copy of the
    /// control-block reference.
    pub fn new(stack_top: usize, entry: usize, tcb: u64) -> Self {
        // sp must stay 16-byte aligned at all times on aarch64.
        let sp = stack_top - 16;

        unsafe {
            std::ptr::write(sp as *mut u64, tcb);
            std::ptr::write((sp + 8) as *mut u64, 0);
        }

        Context {
            sp: sp as u64,
            lr: entry as u64,
            x19: tcb,
            ..Default::default()
        }
    }
}

/// Entry shim for a fresh thread's first switch.
///
/// Reads the control-block reference from the reserved word at the top
/// of the stack and hands it to the wrapper as its argument. The stack
/// word is authoritative: unlike a callee-saved register, a generated
/// prologue cannot clobber it before the wrapper sees it. The wrapper
/// never returns, and the trap stands in for the sentinel return
/// address, which must never be executed either.
#[unsafe(naked)]
pub(crate) extern "C" fn thread_start() {
    naked_asm!(
        // sp points at the start-up signature: [tcb, 0]
        "ldr x0, [sp]",
        "bl {main}",
        "brk #0",
        main = sym crate::pool::thread_main,
    );
}

/// Switch from one context to another
///
/// Saves the current CPU state into `old` and restores state from `new`.
/// This function returns when another context switches back to `old`.
/// Nothing can observe a partially saved or restored state: the logical
/// thread of control is inside this routine for the whole transfer.
///
/// # Safety
/// Both pointers must be valid. The `new` context must have been properly
/// initialized (either by a previous `context_switch` or by [`Context::new`]).
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(_old: *mut Context, _new: *const Context) {
    // Arguments: x0 = old, x1 = new
    naked_asm!(
        // Save callee-saved registers to old context (x0)
        "mov x9, sp",
        "str x9,  [x0, #0x00]", // sp
        "str lr,  [x0, #0x08]", // lr (x30)
        "str fp,  [x0, #0x10]", // fp (x29)
        "str x19, [x0, #0x18]",
        "str x20, [x0, #0x20]",
        "str x21, [x0, #0x28]",
        "str x22, [x0, #0x30]",
        "str x23, [x0, #0x38]",
        "str x24, [x0, #0x40]",
        "str x25, [x0, #0x48]",
        "str x26, [x0, #0x50]",
        "str x27, [x0, #0x58]",
        "str x28, [x0, #0x60]",
        // Save floating-point callee-saved registers
        "str d8,  [x0, #0x68]",
        "str d9,  [x0, #0x70]",
        "str d10, [x0, #0x78]",
        "str d11, [x0, #0x80]",
        "str d12, [x0, #0x88]",
        "str d13, [x0, #0x90]",
        "str d14, [x0, #0x98]",
        "str d15, [x0, #0xa0]",
        // Load callee-saved registers from new context (x1)
        "ldr x9,  [x1, #0x00]", // sp
        "mov sp, x9",
        "ldr lr,  [x1, #0x08]", // lr (x30)
        "ldr fp,  [x1, #0x10]", // fp (x29)
        "ldr x19, [x1, #0x18]",
        "ldr x20, [x1, #0x20]",
        "ldr x21, [x1, #0x28]",
        "ldr x22, [x1, #0x30]",
        "ldr x23, [x1, #0x38]",
        "ldr x24, [x1, #0x40]",
        "ldr x25, [x1, #0x48]",
        "ldr x26, [x1, #0x50]",
        "ldr x27, [x1, #0x58]",
        "ldr x28, [x1, #0x60]",
        // Load floating-point callee-saved registers
        "ldr d8,  [x1, #0x68]",
        "ldr d9,  [x1, #0x70]",
        "ldr d10, [x1, #0x78]",
        "ldr d11, [x1, #0x80]",
        "ldr d12, [x1, #0x88]",
        "ldr d13, [x1, #0x90]",
        "ldr d14, [x1, #0x98]",
        "ldr d15, [x1, #0xa0]",
        // Return to the new context
        "ret",
    );
}
