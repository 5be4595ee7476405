//! Per-event-type payload field class definitions.
//!
//! Each struct here exists purely to carry a `#[derive(CtfEventClass)]`
//! shape; field *values* aren't modeled (out of scope), so these are
//! metadata-only markers -- a struct's fields describe the shape of its
//! event class's payload structure, nothing more.

use ctf_macros::CtfEventClass;
use enum_iterator::Sequence;
use std::ffi::CStr;

#[derive(CtfEventClass)]
#[event_name = "TRACE_START"]
pub struct TraceStart<'a> {
    pub task_handle: i64,
    pub task: &'a CStr,
}

#[derive(CtfEventClass)]
#[event_name = "UNKNOWN"]
pub struct Unknown<'a> {
    pub event_type: &'a CStr,
}

#[derive(CtfEventClass)]
#[event_name = "USER_EVENT"]
pub struct User<'a> {
    pub channel: &'a CStr,
    pub format_string: &'a CStr,
    pub formatted_string: &'a CStr,
}

#[repr(i64)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Sequence)]
pub enum TaskState {
    Running = 0,
    Interruptible = 1,
    UnInterruptible = 2,
    Stopped = 4,
    Traced = 8,
    ExitDead = 16,
    ExitZombie = 32,
    Parked = 64,
    Dead = 128,
    WakeKill = 256,
    Waking = 512,
    NoLoad = 1024,
    New = 2048,
}

impl TaskState {
    pub fn as_i64(&self) -> i64 {
        *self as i64
    }
}

#[derive(CtfEventClass)]
#[event_name = "sched_switch"]
pub struct SchedSwitch<'a> {
    pub src_event_type: &'a CStr,
    pub prev_comm: &'a CStr,
    pub prev_tid: i64,
    pub prev_prio: i64,
    pub prev_state: TaskState,
    pub next_comm: &'a CStr,
    pub next_tid: i64,
    pub next_prio: i64,
}

#[derive(CtfEventClass)]
#[event_name = "sched_wakeup"]
pub struct SchedWakeup<'a> {
    pub src_event_type: &'a CStr,
    pub comm: &'a CStr,
    pub tid: i64,
    pub prio: i64,
    pub target_cpu: i64,
}

#[derive(CtfEventClass)]
#[event_name = "irq_handler_entry"]
pub struct IrqHandlerEntry<'a> {
    pub src_event_type: &'a CStr,
    pub irq: i64,
    pub name: &'a CStr,
    pub prio: i64,
}

#[derive(CtfEventClass)]
#[event_name = "irq_handler_exit"]
pub struct IrqHandlerExit<'a> {
    pub src_event_type: &'a CStr,
    pub irq: i64,
    pub name: &'a CStr,
    pub ret: i64,
}

#[derive(CtfEventClass)]
#[event_name_from_event_type]
pub struct Unsupported {
    // No payload fields
}
