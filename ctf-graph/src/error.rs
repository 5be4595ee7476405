//! Per-thread error chain (spec §4.5.3), ported from `current-thread.c`
//! and `error.h`.
//!
//! Each failing call appends one [`Cause`] to the calling thread's
//! chain and returns a [`crate::status::FuncStatus`]; the chain is
//! cleared only by the caller (`clear_error`) or consumed by
//! `take_error`. In debug builds, [`assert_no_error_on_ok`] enforces the
//! contract that a method cannot return `Ok` while the thread holds an
//! error.

use std::cell::RefCell;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Unknown,
    Component {
        name: String,
        class_name: String,
    },
    ComponentClass {
        class_name: String,
    },
    MessageIterator {
        comp_name: String,
        output_port_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cause {
    pub actor: Actor,
    pub module_name: String,
    pub message: String,
    pub file: String,
    pub line: u64,
}

thread_local! {
    static THREAD_ERROR: RefCell<Vec<Cause>> = const { RefCell::new(Vec::new()) };
}

fn push(cause: Cause) {
    THREAD_ERROR.with(|e| e.borrow_mut().push(cause));
}

pub fn append_cause_from_unknown(module_name: &str, file: &str, line: u64, message: impl Into<String>) {
    push(Cause {
        actor: Actor::Unknown,
        module_name: module_name.to_string(),
        message: message.into(),
        file: file.to_string(),
        line,
    });
}

pub fn append_cause_from_component(
    comp_name: &str,
    comp_class_name: &str,
    module_name: &str,
    file: &str,
    line: u64,
    message: impl Into<String>,
) {
    push(Cause {
        actor: Actor::Component {
            name: comp_name.to_string(),
            class_name: comp_class_name.to_string(),
        },
        module_name: module_name.to_string(),
        message: message.into(),
        file: file.to_string(),
        line,
    });
}

pub fn append_cause_from_component_class(
    comp_class_name: &str,
    module_name: &str,
    file: &str,
    line: u64,
    message: impl Into<String>,
) {
    push(Cause {
        actor: Actor::ComponentClass {
            class_name: comp_class_name.to_string(),
        },
        module_name: module_name.to_string(),
        message: message.into(),
        file: file.to_string(),
        line,
    });
}

pub fn append_cause_from_message_iterator(
    comp_name: &str,
    output_port_name: &str,
    module_name: &str,
    file: &str,
    line: u64,
    message: impl Into<String>,
) {
    push(Cause {
        actor: Actor::MessageIterator {
            comp_name: comp_name.to_string(),
            output_port_name: output_port_name.to_string(),
        },
        module_name: module_name.to_string(),
        message: message.into(),
        file: file.to_string(),
        line,
    });
}

/// Removes and returns the current thread's error chain, leaving it
/// empty. `None` if the thread holds no error.
pub fn take_error() -> Option<Vec<Cause>> {
    THREAD_ERROR.with(|e| {
        let mut chain = e.borrow_mut();
        if chain.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut *chain))
        }
    })
}

/// Discards the current thread's error chain.
pub fn clear_error() {
    THREAD_ERROR.with(|e| e.borrow_mut().clear());
}

/// Replaces the current thread's error chain with `chain`, discarding
/// whatever was there (ported from `bt_current_thread_move_error`,
/// which first clears, then installs).
pub fn move_error(chain: Vec<Cause>) {
    THREAD_ERROR.with(|e| *e.borrow_mut() = chain);
}

pub fn has_error() -> bool {
    THREAD_ERROR.with(|e| !e.borrow().is_empty())
}

/// Debug-mode assertion that the thread doesn't hold an error: used at
/// the return point of any function about to report `FuncStatus::Ok`.
pub fn assert_no_error_on_ok() {
    debug_assert!(
        !has_error(),
        "a method is returning Ok while the thread's error chain is non-empty"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_error_drains_and_clears() {
        clear_error();
        append_cause_from_unknown("mod", "file.rs", 1, "boom");
        assert!(has_error());
        let chain = take_error().unwrap();
        assert_eq!(chain.len(), 1);
        assert!(!has_error());
    }

    #[test]
    fn take_error_is_none_when_empty() {
        clear_error();
        assert!(take_error().is_none());
    }

    #[test]
    fn move_error_replaces_chain() {
        clear_error();
        append_cause_from_unknown("mod", "file.rs", 1, "first");
        let incoming = vec![Cause {
            actor: Actor::Unknown,
            module_name: "other".to_string(),
            message: "second".to_string(),
            file: "other.rs".to_string(),
            line: 2,
        }];
        move_error(incoming);
        let chain = take_error().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].message, "second");
    }
}
