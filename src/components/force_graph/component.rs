//! Leptos component wrapping the graph canvas.
//!
//! The component creates an HTML canvas element and wires up mouse/wheel event
//! handlers for hovering, panning and zooming. Frames are requested through
//! `requestAnimationFrame` only while the simulation is warm or after an
//! input changed something visible; a settled graph costs nothing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use send_wrapper::SendWrapper;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::render;
use super::scale::ScaleConfig;
use super::state::CanvasState;
use super::theme::Theme;
use super::types::GraphView;

/// Bundles canvas state with the 2d context and visual configuration.
struct GraphContext {
	state: CanvasState,
	ctx: CanvasRenderingContext2d,
	scale: ScaleConfig,
	theme: Theme,
}

type SharedContext = Rc<RefCell<Option<GraphContext>>>;

/// At most one outstanding animation frame.
#[derive(Default)]
struct FrameLoop {
	callback: RefCell<Option<Closure<dyn FnMut()>>>,
	/// Request id of the outstanding frame.
	pending: Cell<Option<i32>>,
}

impl FrameLoop {
	fn request(&self) {
		if self.pending.get().is_some() {
			return;
		}
		let callback = self.callback.borrow();
		let Some(cb) = callback.as_ref() else {
			return;
		};
		let requested = web_sys::window()
			.and_then(|window| window.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
		self.pending.set(requested);
	}

	/// Cancel the outstanding frame and release the callback. A stopped loop
	/// ignores further requests.
	fn stop(&self) {
		if let Some(id) = self.pending.take() {
			if let Some(window) = web_sys::window() {
				let _ = window.cancel_animation_frame(id);
			}
		}
		self.callback.borrow_mut().take();
	}
}

fn viewport_size(window: &Window) -> Option<(f64, f64)> {
	Some((
		window.inner_width().ok()?.as_f64()?,
		window.inner_height().ok()?.as_f64()?,
	))
}

/// Pointer position relative to the canvas.
fn pointer(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

/// Renders the graph of a [`GraphView`] on a canvas element.
///
/// The force simulation exists only while the view's perspective is
/// abstract. Set `fullscreen = true` to fill the viewport and follow window
/// resizes; otherwise the canvas takes its parent's size once.
#[component]
pub fn TapestryCanvas(
	#[prop(into)] view: Signal<GraphView>,
	#[prop(default = false)] fullscreen: bool,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let context: SharedContext = Rc::new(RefCell::new(None));
	let frames = Rc::new(FrameLoop::default());
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let (context_init, frames_init, resize_init) =
		(context.clone(), frames.clone(), resize_cb.clone());

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		if context_init.borrow().is_some() {
			return;
		}
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			log::error!("tapestry: no window, canvas disabled");
			return;
		};

		let (w, h) = if fullscreen {
			viewport_size(&window).unwrap_or((800.0, 600.0))
		} else {
			canvas
				.parent_element()
				.map(|p| (p.client_width() as f64, p.client_height() as f64))
				.unwrap_or((800.0, 600.0))
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let ctx = match canvas.get_context("2d") {
			Ok(Some(obj)) => match obj.dyn_into::<CanvasRenderingContext2d>() {
				Ok(ctx) => ctx,
				Err(_) => {
					log::error!("tapestry: 2d context has unexpected type");
					return;
				}
			},
			_ => {
				log::error!("tapestry: canvas 2d context unavailable");
				return;
			}
		};

		let mut state = CanvasState::new(w, h);
		state.sync(&view.get_untracked());
		*context_init.borrow_mut() = Some(GraphContext {
			state,
			ctx,
			scale: ScaleConfig::default(),
			theme: Theme::default(),
		});

		if fullscreen {
			let (context_resize, canvas_resize, frames_resize) =
				(context_init.clone(), canvas.clone(), frames_init.clone());
			*resize_init.borrow_mut() = Some(Closure::new(move || {
				let Some((nw, nh)) = web_sys::window().as_ref().and_then(viewport_size) else {
					return;
				};
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut c) = *context_resize.borrow_mut() {
					c.state.resize(nw, nh);
				}
				frames_resize.request();
			}));
			if let Some(ref cb) = *resize_init.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (context_anim, frames_anim) = (context_init.clone(), frames_init.clone());
		*frames_init.callback.borrow_mut() = Some(Closure::new(move || {
			frames_anim.pending.set(None);
			let again = match *context_anim.borrow_mut() {
				Some(ref mut c) => {
					c.state.tick();
					if c.state.dirty {
						render::render(&c.state, &c.ctx, &c.scale, &c.theme);
						c.state.dirty = false;
					}
					c.state.is_animating()
				}
				None => false,
			};
			if again {
				frames_anim.request();
			}
		}));
		frames_init.request();
	});

	let teardown = SendWrapper::new((resize_cb.clone(), frames.clone()));
	on_cleanup(move || {
		let (resize_cb, frames) = teardown.take();
		if let (Some(window), Some(cb)) = (web_sys::window(), resize_cb.borrow_mut().take()) {
			let _ = window.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}
		frames.stop();
	});

	let (context_view, frames_view) = (context.clone(), frames.clone());
	Effect::new(move |_| {
		let current = view.get();
		if let Some(ref mut c) = *context_view.borrow_mut() {
			c.state.sync(&current);
		}
		frames_view.request();
	});

	let context_md = context.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some((x, y)) = pointer(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut c) = *context_md.borrow_mut() {
			if c.state.hit_test(x, y, &c.scale).is_none() {
				c.state.pan.active = true;
				c.state.pan.start_x = x;
				c.state.pan.start_y = y;
				c.state.pan.transform_start_x = c.state.transform.x;
				c.state.pan.transform_start_y = c.state.transform.y;
			}
		}
	};

	let (context_mm, frames_mm) = (context.clone(), frames.clone());
	let on_mousemove = move |ev: MouseEvent| {
		let Some((x, y)) = pointer(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut c) = *context_mm.borrow_mut() {
			if c.state.pan.active {
				c.state.transform.x = c.state.pan.transform_start_x + (x - c.state.pan.start_x);
				c.state.transform.y = c.state.pan.transform_start_y + (y - c.state.pan.start_y);
				c.state.dirty = true;
			} else {
				c.state.set_hover_at(x, y, &c.scale);
			}
		}
		frames_mm.request();
	};

	let context_mu = context.clone();
	let on_mouseup = move |_: MouseEvent| {
		if let Some(ref mut c) = *context_mu.borrow_mut() {
			c.state.pan.active = false;
		}
	};

	let (context_mo, frames_mo) = (context.clone(), frames.clone());
	let on_mouseout = move |_: MouseEvent| {
		if let Some(ref mut c) = *context_mo.borrow_mut() {
			c.state.pan.active = false;
			c.state.clear_hover();
		}
		frames_mo.request();
	};

	let (context_wh, frames_wh) = (context.clone(), frames.clone());
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = pointer(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut c) = *context_wh.borrow_mut() {
			let factor = c.scale.wheel_factor(ev.delta_y());
			c.state.transform.zoom_at(x, y, factor, &c.scale);
			c.state.dirty = true;
		}
		frames_wh.request();
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="tapestry-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseout=on_mouseout
			on:wheel=on_wheel
			style="display: block; cursor: grab;"
		/>
	}
}
