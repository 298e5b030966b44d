//! Event-loop seam: wall clock, timers and task spawning.
//!
//! The browser implementation sits on `setTimeout` and the leptos task
//! spawner. Tests drive [`manual::ManualRuntime`] by hand.

use std::time::Duration;

use futures::future::LocalBoxFuture;

/// Single-threaded scheduling primitives the store needs.
pub trait Runtime {
	/// Wall clock in epoch milliseconds.
	fn now_ms(&self) -> f64;
	/// Run `task` once after `delay`.
	fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>);
	/// Drive a future to completion on the current thread.
	fn spawn_local(&self, fut: LocalBoxFuture<'static, ()>);
}

/// Runtime backed by the browser event loop.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserRuntime;

impl Runtime for BrowserRuntime {
	fn now_ms(&self) -> f64 {
		js_sys::Date::now()
	}

	fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) {
		use wasm_bindgen::JsCast;
		use wasm_bindgen::closure::Closure;

		let Some(window) = web_sys::window() else {
			log::error!("tapestry: no window, dropping timer");
			return;
		};
		let cb = Closure::once_into_js(move || task());
		if let Err(e) = window.set_timeout_with_callback_and_timeout_and_arguments_0(
			cb.unchecked_ref(),
			timeout_ms(delay),
		) {
			log::error!("tapestry: setTimeout failed: {:?}", e);
		}
	}

	fn spawn_local(&self, fut: LocalBoxFuture<'static, ()>) {
		leptos::task::spawn_local(fut);
	}
}

/// `setTimeout` takes a signed 32-bit delay; longer ones saturate.
fn timeout_ms(delay: Duration) -> i32 {
	i32::try_from(delay.as_millis()).unwrap_or(i32::MAX)
}
