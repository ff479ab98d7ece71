use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Object, Promise, Reflect};
use log::{debug, info};
use shelf_core::CameraConfig;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, JsFuture};
use web_sys::{
    HtmlCanvasElement, HtmlVideoElement, MediaStream, MediaStreamConstraints, MediaStreamTrack,
    MediaTrackConstraints,
};

use crate::dom::{canvas_to_jpeg, context_2d, element_by_id, window};
use crate::errors::js_error;
use crate::options::shelf_config;

/// Rear-camera preview and still capture.
///
/// Holds at most one live stream; starting again releases the previous one.
#[wasm_bindgen]
pub struct Camera {
    config: CameraConfig,
    stream: Rc<RefCell<Option<MediaStream>>>,
}

#[wasm_bindgen]
impl Camera {
    /// `config` is an optional `ShelfConfig`-shaped object; only its `camera` section is used.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<Camera, JsValue> {
        let config = shelf_config(config)?;
        Ok(Camera {
            config: config.camera,
            stream: Rc::new(RefCell::new(None)),
        })
    }

    /// Requests the camera and plays it in the `<video>` with id `video_id`.
    ///
    /// Rejects with `Video element not found: <id>` when the element is missing, and with the
    /// browser's error when no camera is available or permission is denied.
    pub fn start(&self, video_id: String) -> Promise {
        let config = self.config.clone();
        let slot = self.stream.clone();
        future_to_promise(async move {
            let video = element_by_id::<HtmlVideoElement>(&video_id)?
                .ok_or_else(|| js_error(&format!("Video element not found: {video_id}")))?;
            release(&slot);

            let devices = window()?.navigator().media_devices()?;
            let request = devices.get_user_media_with_constraints(&stream_constraints(&config)?)?;
            let stream: MediaStream = JsFuture::from(request).await?.dyn_into()?;

            video.set_src_object(Some(&stream));
            *slot.borrow_mut() = Some(stream);
            JsFuture::from(video.play()?).await?;
            info!("event=camera_start status=ok video={video_id}");
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Stops every track of the live stream. Safe to call when nothing is running.
    pub fn stop(&self) {
        release(&self.stream);
    }

    /// Draws the current frame of `video_id` into `canvas_id` and returns it as a JPEG data URI.
    ///
    /// Returns `null` when either element is missing.
    pub fn capture(&self, video_id: &str, canvas_id: &str) -> Result<Option<String>, JsValue> {
        let (Some(video), Some(canvas)) = (
            element_by_id::<HtmlVideoElement>(video_id)?,
            element_by_id::<HtmlCanvasElement>(canvas_id)?,
        ) else {
            debug!("event=camera_capture status=skipped reason=missing_element");
            return Ok(None);
        };

        let (width, height) = self.config.frame_size(video.video_width(), video.video_height());
        canvas.set_width(width);
        canvas.set_height(height);
        context_2d(&canvas)?.draw_image_with_html_video_element_and_dw_and_dh(
            &video,
            0.0,
            0.0,
            f64::from(width),
            f64::from(height),
        )?;
        let data_url = canvas_to_jpeg(&canvas, self.config.jpeg_quality)?;
        info!("event=camera_capture status=ok size={width}x{height}");
        Ok(Some(data_url))
    }

    /// Whether a stream is currently held.
    #[wasm_bindgen(getter, js_name = "isActive")]
    pub fn is_active(&self) -> bool {
        self.stream.borrow().is_some()
    }
}

fn release(slot: &Rc<RefCell<Option<MediaStream>>>) {
    let Some(stream) = slot.borrow_mut().take() else {
        return;
    };
    for track in stream.get_tracks().iter() {
        if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
            track.stop();
        }
    }
    info!("event=camera_stop status=ok");
}

fn stream_constraints(config: &CameraConfig) -> Result<MediaStreamConstraints, JsValue> {
    let video = MediaTrackConstraints::new();
    video.set_facing_mode(&JsValue::from_str(&config.facing_mode));
    video.set_width(&ideal(config.ideal_width)?);
    video.set_height(&ideal(config.ideal_height)?);

    let constraints = MediaStreamConstraints::new();
    constraints.set_video(&video);
    constraints.set_audio(&JsValue::FALSE);
    Ok(constraints)
}

/// `{ ideal: value }`
fn ideal(value: u32) -> Result<JsValue, JsValue> {
    let object = Object::new();
    Reflect::set(&object, &JsValue::from_str("ideal"), &JsValue::from(value))?;
    Ok(object.into())
}
