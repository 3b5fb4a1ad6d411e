//! Browser entry point: binds the controller to the served page.
//!
//! Build with `wasm-pack build --target web --out-dir static/pkg`.

use crate::client::HttpBackend;
use crate::controller::PlaylistFormController;
use crate::page::{
    ElementId, Page, ARTIST_INPUT_CLASS, ARTIST_INPUT_PLACEHOLDER, HIDDEN_CLASS,
    SONG_INPUT_CLASS, SONG_INPUT_PLACEHOLDER,
};
use crate::runtime::BrowserRuntime;
use std::future::Future;
use std::rc::Rc;
use tracing::{info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, HtmlInputElement, HtmlTextAreaElement, Window,
};

type BrowserController = PlaylistFormController<DomPage, HttpBackend, BrowserRuntime>;

#[derive(Clone)]
pub struct DomPage {
    window: Window,
    document: Document,
}

impl DomPage {
    fn new() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self { window, document })
    }

    fn element(&self, id: ElementId) -> Option<Element> {
        let element = self.document.get_element_by_id(id.as_str());
        if element.is_none() {
            warn!("Element #{} not found", id);
        }
        element
    }

    fn input_value(element: &Element) -> String {
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            return input.value();
        }
        if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
            return area.value();
        }
        String::new()
    }

    fn values_of(&self, selector: &str) -> Vec<String> {
        let Ok(nodes) = self.document.query_selector_all(selector) else {
            return Vec::new();
        };
        (0..nodes.length())
            .filter_map(|i| nodes.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .map(|element| Self::input_value(&element))
            .collect()
    }

    fn create_input(&self, class: &str, placeholder: &str) -> Option<HtmlInputElement> {
        let input: HtmlInputElement = self.document.create_element("input").ok()?.dyn_into().ok()?;
        input.set_placeholder(placeholder);
        input.set_class_name(class);
        Some(input)
    }
}

impl Page for DomPage {
    type Popup = Window;

    fn set_hidden(&self, id: ElementId, hidden: bool) {
        let Some(element) = self.element(id) else {
            return;
        };
        let classes = element.class_list();
        let result = if hidden {
            classes.add_1(HIDDEN_CLASS)
        } else {
            classes.remove_1(HIDDEN_CLASS)
        };
        if let Err(e) = result {
            warn!("Failed to toggle #{}: {:?}", id, e);
        }
    }

    fn is_hidden(&self, id: ElementId) -> bool {
        self.element(id)
            .map(|element| element.class_list().contains(HIDDEN_CLASS))
            .unwrap_or(true)
    }

    fn set_text(&self, id: ElementId, text: &str) {
        if let Some(element) = self.element(id) {
            element.set_text_content(Some(text));
        }
    }

    fn text(&self, id: ElementId) -> String {
        self.element(id)
            .and_then(|element| element.text_content())
            .unwrap_or_default()
    }

    fn value(&self, id: ElementId) -> String {
        self.element(id)
            .map(|element| Self::input_value(&element))
            .unwrap_or_default()
    }

    fn set_href(&self, id: ElementId, url: &str) {
        if let Some(element) = self.element(id) {
            if let Err(e) = element.set_attribute("href", url) {
                warn!("Failed to set #{} href: {:?}", id, e);
            }
        }
    }

    fn append_song_fields(&self) {
        let Some(container) = self.element(ElementId::InputFields) else {
            return;
        };
        for (class, placeholder) in [
            (SONG_INPUT_CLASS, SONG_INPUT_PLACEHOLDER),
            (ARTIST_INPUT_CLASS, ARTIST_INPUT_PLACEHOLDER),
        ] {
            let Some(input) = self.create_input(class, placeholder) else {
                warn!("Failed to create .{} input", class);
                continue;
            };
            if let Err(e) = container.append_child(&input) {
                warn!("Failed to append .{} input: {:?}", class, e);
            }
        }
    }

    fn song_fields(&self) -> Vec<(String, String)> {
        let mut artists = self
            .values_of(&format!(".{}", ARTIST_INPUT_CLASS))
            .into_iter();
        self.values_of(&format!(".{}", SONG_INPUT_CLASS))
            .into_iter()
            .map(|song| (song, artists.next().unwrap_or_default()))
            .collect()
    }

    fn navigate(&self, url: &str) {
        if let Err(e) = self.window.location().set_href(url) {
            warn!("Navigation to {} failed: {:?}", url, e);
        }
    }

    fn open_popup(&self, url: &str, name: &str, features: &str) -> Option<Window> {
        self.window
            .open_with_url_and_target_and_features(url, name, features)
            .ok()
            .flatten()
    }

    fn close_popup(&self, popup: Window) {
        if let Err(e) = popup.close() {
            warn!("Failed to close popup: {:?}", e);
        }
    }
}

/// `tracing` output sink that writes each formatted event to the browser
/// console.
#[derive(Default)]
struct ConsoleWriter {
    buffer: Vec<u8>,
}

impl std::io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buffer);
        let line = line.trim_end();
        if !line.is_empty() {
            web_sys::console::log_1(&JsValue::from_str(line));
        }
    }
}

fn init_logging() {
    // No clock on wasm32-unknown-unknown, so events carry no timestamp.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("playlist_maker=debug"))
        .with_writer(ConsoleWriter::default)
        .with_ansi(false)
        .without_time()
        .try_init();
}

fn on_click<F, Fut>(page: &DomPage, id: ElementId, controller: &Rc<BrowserController>, handler: F)
where
    F: Fn(Rc<BrowserController>) -> Fut + 'static,
    Fut: Future<Output = ()> + 'static,
{
    let Some(element) = page.element(id) else {
        return;
    };
    let controller = controller.clone();
    let callback = Closure::<dyn FnMut()>::new(move || {
        wasm_bindgen_futures::spawn_local(handler(controller.clone()));
    });
    if let Err(e) =
        element.add_event_listener_with_callback("click", callback.as_ref().unchecked_ref())
    {
        warn!("Failed to bind #{}: {:?}", id, e);
    }
    // Listeners live as long as the page.
    callback.forget();
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    init_logging();

    let page = DomPage::new().ok_or_else(|| JsValue::from_str("No document available"))?;
    let origin = page.window.location().origin()?;
    let controller = Rc::new(PlaylistFormController::new(
        page.clone(),
        HttpBackend::new(origin),
        BrowserRuntime,
    ));

    on_click(&page, ElementId::LoginButton, &controller, |c| async move {
        c.login()
    });
    on_click(&page, ElementId::LogoutButton, &controller, |c| async move {
        c.logout().await
    });
    on_click(&page, ElementId::AddSong, &controller, |c| async move {
        c.add_song_fields()
    });
    on_click(&page, ElementId::SubmitPlaylist, &controller, |c| async move {
        c.submit().await
    });

    if page.document.ready_state() == "loading" {
        let c = controller.clone();
        let on_ready = Closure::<dyn FnMut()>::new(move || {
            let c = c.clone();
            wasm_bindgen_futures::spawn_local(async move { c.sync_auth_view().await });
        });
        page.document
            .add_event_listener_with_callback("DOMContentLoaded", on_ready.as_ref().unchecked_ref())?;
        on_ready.forget();
    } else {
        wasm_bindgen_futures::spawn_local(async move { controller.sync_auth_view().await });
    }

    info!("Playlist form controller started");
    Ok(())
}
