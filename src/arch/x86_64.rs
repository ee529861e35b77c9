//! x86_64 implementation of context switching

use std::arch::naked_asm;

/// Saved CPU context for a thread
///
/// On x86_64 System V ABI, these are the callee-saved registers
/// that must be preserved across function calls. The return address
/// lives on the stack, so `rsp` doubles as the return-address slot.
#[repr(C)]
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Stack pointer
    rsp: u64,
    /// Frame pointer
    rbp: u64,
    /// General purpose (callee-saved)
    rbx: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
}

impl Context {
    /// Create the initial context for a fresh thread.
    ///
    /// - `stack_top`: top of the allocated stack (highest address), 16-byte aligned
    /// - `entry`: address of the start shim ([`thread_start`])
    /// - `tcb`: control-block pointer, read back by the shim
    ///
    /// The top of the stack holds the start-up signature: the control-block
    /// reference and a null sentinel return address that must never be
    /// executed. The entry address sits one word below them, so the first
    /// switch pops it and leaves RSP on the signature words, 16-byte
    /// aligned; the shim's `call` then enters the wrapper at 16n+8, as the
    /// ABI requires at function entry. r15 carries a spare copy of the
    /// control-block reference.
    pub fn new(stack_top: usize, entry: usize, tcb: u64) -> Self {
        // Stack layout (growing downward):
        //   stack_top - 8:  0       (sentinel return address)
        //   stack_top - 16: tcb     (control-block reference)
        //   stack_top - 24: entry   (popped by `ret` on the first switch)
        let initial_rsp = stack_top - 24;

        unsafe {
            std::ptr::write((stack_top - 8) as *mut u64, 0);
            std::ptr::write((stack_top - 16) as *mut u64, tcb);
            std::ptr::write(initial_rsp as *mut u64, entry as u64);
        }

        Context {
            rsp: initial_rsp as u64,
            r15: tcb,
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
        // RSP points at the start-up signature: [tcb, 0]
        "mov rdi, [rsp]",
        "call {main}",
        "ud2",
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
    naked_asm!(
        // Save callee-saved registers to old context (rdi)
        "mov [rdi + 0x00], rsp",
        "mov [rdi + 0x08], rbp",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x20], r13",
        "mov [rdi + 0x28], r14",
        "mov [rdi + 0x30], r15",
        // Load callee-saved registers from new context (rsi)
        "mov rsp, [rsi + 0x00]",
        "mov rbp, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov r12, [rsi + 0x18]",
        "mov r13, [rsi + 0x20]",
        "mov r14, [rsi + 0x28]",
        "mov r15, [rsi + 0x30]",
        // Return to the new context
        // For a fresh thread: pops the wrapper address and jumps there
        // For a yielded thread: returns to where it called context_switch
        "ret",
    );
}
