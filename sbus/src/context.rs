//! Per-call request context (spec.md section 4.E).
//!
//! Grounded in `dbus-crossroads/src/context.rs`'s `Context`, extended with
//! the caller-identity slot and the async split between "dispatcher resolved
//! the handler" and "continuation has the caller id" that spec.md section
//! 4.D describes (`sbus_message_handler` / `sbus_get_sender_id_send` /
//! `sbus_message_handler_got_caller_id` in the original C).

use crate::error::MethodErr;
use dbus::arg::AppendAll;
use dbus::channel::Sender;
use dbus::Message;
use std::sync::Arc;

/// The originating process's identity, resolved once per request before the
/// handler runs (spec.md section 3: "Caller identity").
#[derive(Debug, Clone)]
pub struct CallerId {
    pub unix_uid: Option<u32>,
    pub unique_name: String,
}

/// Per-call state: the originating message, resolved interface/method names,
/// the caller identity once known, and the reply-finish handle.
///
/// Exactly one of [`Context::finish`] / [`Context::fail_and_finish`] must be
/// called. Both consume `self`, so that invariant is enforced by the type
/// system for any caller that doesn't explicitly leak the value — the
/// `Drop` impl logs the rarer case of a handler bug that drops `Context`
/// without finishing it, since the spec also requires the dispatcher to
/// "not silently leak requests" (section 7).
pub struct Context {
    message: Message,
    interface: Arc<str>,
    method: Arc<str>,
    caller: Option<CallerId>,
    conn: Arc<dyn Sender + Send + Sync>,
    finished: bool,
}

impl Context {
    pub fn new(
        message: Message,
        interface: Arc<str>,
        method: Arc<str>,
        conn: Arc<dyn Sender + Send + Sync>,
    ) -> Self {
        Context {
            message,
            interface,
            method,
            caller: None,
            conn,
            finished: false,
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn path(&self) -> dbus::Path<'static> {
        self.message
            .path()
            .expect("dispatcher only builds a Context for messages with a path")
            .into_static()
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn caller(&self) -> Option<&CallerId> {
        self.caller.as_ref()
    }

    /// Populated by the dispatcher between steps 5 and 6 of spec.md section
    /// 4.D, once the async caller-id resolution completes.
    pub fn set_caller(&mut self, caller: CallerId) {
        self.caller = Some(caller);
    }

    /// Serializes `args` as the method's return values, queues the reply on
    /// the connection, and consumes the context.
    pub fn finish<A: AppendAll>(mut self, args: A) {
        if self.message.get_no_reply() {
            self.finished = true;
            return;
        }
        let mut reply = self.message.method_return();
        args.append(&mut dbus::arg::IterAppend::new(&mut reply));
        let _ = self.conn.send(reply);
        self.finished = true;
    }

    /// Queues an error reply built from `err` and consumes the context.
    pub fn fail_and_finish(mut self, err: MethodErr) {
        if !self.message.get_no_reply() {
            let _ = self.conn.send(err.to_message(&self.message));
        }
        self.finished = true;
    }

    /// Enqueues a raw reply, bypassing the normal finish path. Used by the
    /// dispatcher for unknown-interface/unknown-method errors that occur
    /// before a full `Context` is constructed.
    pub fn send_reply(conn: &(dyn Sender + Send + Sync), message: Message) {
        let _ = conn.send(message);
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if !self.finished {
            slog_scope::error!(
                "request context for {}.{} dropped without a reply: programming error",
                self.interface,
                self.method,
            );
        }
    }
}
