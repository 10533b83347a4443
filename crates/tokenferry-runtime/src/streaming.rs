//! Streaming bridge between caller-owned sinks and the engine callback.
//!
//! The engine invokes its callback synchronously, once per token chunk, on
//! the generating thread. This module adapts a caller capability to that
//! shape without buffering, transformation or error recovery — a failure
//! inside the sink is a caller bug, not something this layer catches.

use tokenferry_core::StreamControl;

/// Caller-supplied capability receiving generated token chunks.
///
/// Return `false` to stop generation; the engine stops at an engine-defined
/// point no later than the next chunk. Chunks arrive as raw UTF-8 bytes
/// which may end mid-scalar; see [`Utf8Sink`] for reassembly.
pub trait TokenSink {
    fn on_token(&mut self, chunk: &[u8]) -> bool;
}

impl<F> TokenSink for F
where
    F: FnMut(&[u8]) -> bool,
{
    fn on_token(&mut self, chunk: &[u8]) -> bool {
        self(chunk)
    }
}

/// Adapt a sink to the engine's callback shape for the duration of one
/// call. Holds only a borrow; no ownership moves toward the engine.
pub(crate) fn bridge_sink<'a>(
    sink: &'a mut dyn TokenSink,
) -> impl FnMut(&[u8]) -> StreamControl + 'a {
    move |chunk| {
        if sink.on_token(chunk) {
            StreamControl::Running
        } else {
            StreamControl::Stop
        }
    }
}

/// Sink that reassembles UTF-8 across chunk boundaries and forwards only
/// complete text to a closure. Incomplete trailing bytes are carried into
/// the next chunk.
pub struct Utf8Sink<F: FnMut(&str) -> bool> {
    cb: F,
    carry: Vec<u8>,
}

impl<F: FnMut(&str) -> bool> Utf8Sink<F> {
    pub fn new(cb: F) -> Self {
        Self { cb, carry: Vec::new() }
    }
}

impl<F: FnMut(&str) -> bool> TokenSink for Utf8Sink<F> {
    fn on_token(&mut self, chunk: &[u8]) -> bool {
        self.carry.extend_from_slice(chunk);

        let valid_up_to = match std::str::from_utf8(&self.carry) {
            Ok(_) => self.carry.len(),
            Err(e) => e.valid_up_to(),
        };

        if valid_up_to == 0 {
            // Still waiting for the rest of a scalar.
            return true;
        }

        let consumed: Vec<u8> = self.carry.drain(..valid_up_to).collect();
        // SAFETY: valid_up_to is a UTF-8 boundary per from_utf8 above.
        let text = unsafe { std::str::from_utf8_unchecked(&consumed) };
        (self.cb)(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_a_sink() {
        let mut seen = Vec::new();
        let mut sink = |chunk: &[u8]| {
            seen.push(chunk.to_vec());
            true
        };
        assert!(sink.on_token(b"abc"));
        assert_eq!(seen, vec![b"abc".to_vec()]);
    }

    #[test]
    fn test_bridge_sink_maps_continue_and_stop() {
        let mut remaining = 2;
        let mut sink = |_: &[u8]| {
            remaining -= 1;
            remaining > 0
        };
        let mut relay = bridge_sink(&mut sink);
        assert_eq!(relay(b"x"), StreamControl::Running);
        assert_eq!(relay(b"y"), StreamControl::Stop);
    }

    #[test]
    fn test_utf8_sink_reassembles_split_scalar() {
        // "é" is 0xC3 0xA9; split it across two chunks.
        let mut texts = Vec::new();
        let mut sink = Utf8Sink::new(|s: &str| {
            texts.push(s.to_string());
            true
        });

        assert!(sink.on_token(b"caf\xC3"));
        assert!(sink.on_token(b"\xA9 au lait"));

        assert_eq!(texts, vec!["caf".to_string(), "\u{e9} au lait".to_string()]);
        assert!(!texts.join("").contains('\u{fffd}'));
    }

    #[test]
    fn test_utf8_sink_waits_on_leading_partial() {
        let texts = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let texts_cb = texts.clone();
        let mut sink = Utf8Sink::new(move |s: &str| {
            texts_cb.borrow_mut().push(s.to_string());
            true
        });

        // A lone continuation-start byte: nothing to forward yet.
        assert!(sink.on_token(b"\xF0\x9F"));
        assert!(texts.borrow().is_empty());

        // Completing the scalar flushes it.
        assert!(sink.on_token(b"\x98\x80"));
        assert_eq!(*texts.borrow(), vec!["\u{1f600}".to_string()]);
    }

    #[test]
    fn test_utf8_sink_propagates_stop() {
        let mut sink = Utf8Sink::new(|_: &str| false);
        assert!(!sink.on_token(b"stop here"));
    }
}
