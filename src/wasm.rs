#![cfg(target_arch = "wasm32")]

use serde_wasm_bindgen::{from_value, to_value};
use tracing::warn;
use wasm_bindgen::prelude::*;

use crate::config::Config;
use crate::controller::{Controller, Event};
use crate::error::{ConfigError, OpponentError, StoreError};
use crate::logging;
use crate::opponent::Transport;
use crate::protocol::{MoveRequest, parse_response};
use crate::store::{MemoryStore, SlotStore, StateStore};
use crate::types::{FirstMover, SessionView};

/// Slots in the tab's session storage.
struct SessionStorage {
    storage: web_sys::Storage,
}

impl SessionStorage {
    fn open() -> Result<Self, StoreError> {
        let storage = web_sys::window()
            .and_then(|window| window.session_storage().ok().flatten())
            .ok_or(StoreError::Unavailable)?;
        Ok(Self { storage })
    }
}

impl SlotStore for SessionStorage {
    fn get(&self, slot: &str) -> Option<String> {
        self.storage.get_item(slot).ok().flatten()
    }

    fn set(&mut self, slot: &str, value: &str) -> Result<(), StoreError> {
        self.storage
            .set_item(slot, value)
            .map_err(|err| StoreError::Backend {
                slot: slot.to_string(),
                reason: format!("{err:?}"),
            })
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.storage.clear().map_err(|err| StoreError::Backend {
            slot: "*".to_string(),
            reason: format!("{err:?}"),
        })
    }
}

/// Hands `(url, ticket)` to a JS function that performs the request and later
/// calls `receiveReply` or `replyFailed` with the same ticket.
struct JsTransport {
    send: js_sys::Function,
    endpoint: String,
}

impl Transport for JsTransport {
    fn send(&mut self, request: &MoveRequest) -> Result<(), OpponentError> {
        let url = JsValue::from_str(&request.url(&self.endpoint));
        let ticket = JsValue::from_f64(request.ticket as f64);
        self.send
            .call2(&JsValue::NULL, &url, &ticket)
            .map(|_| ())
            .map_err(|err| OpponentError::Transport(format!("{err:?}")))
    }
}

fn render(view: &SessionView) -> Result<JsValue, JsError> {
    to_value(view).map_err(|err| JsError::new(&format!("Serialization error: {err}")))
}

/// A game session backed by `window.sessionStorage`.
#[wasm_bindgen]
pub struct MatchTaker {
    controller: Controller,
}

#[wasm_bindgen]
impl MatchTaker {
    /// `config` may be `undefined`, an object or a JSON string. `send` is
    /// required for the remote opponent.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue, send: Option<js_sys::Function>) -> Result<MatchTaker, JsError> {
        console_error_panic_hook::set_once();

        let config: Config = if config.is_undefined() || config.is_null() {
            Config::default()
        } else if let Some(raw) = config.as_string() {
            Config::from_json(&raw)?
        } else {
            from_value(config).map_err(|err| ConfigError::Object(err.to_string()))?
        };
        logging::init(&config.log_filter);

        let transport = send.map(|send| {
            Box::new(JsTransport {
                send,
                endpoint: config.endpoint.clone(),
            }) as Box<dyn Transport>
        });
        let opponent = config.build_opponent(transport)?;

        let backend: Box<dyn SlotStore> = match SessionStorage::open() {
            Ok(storage) => Box::new(storage),
            Err(err) => {
                warn!(%err, "keeping the session in memory only");
                Box::new(MemoryStore::new())
            }
        };
        let store = StateStore::open(backend, config.first_mover, config.skill);
        let mut controller = Controller::new(store, opponent);
        controller.resume();
        Ok(Self { controller })
    }

    pub fn view(&self) -> Result<JsValue, JsError> {
        render(&self.controller.view())
    }

    #[wasm_bindgen(js_name = startOrConfirm)]
    pub fn start_or_confirm(&mut self) -> Result<JsValue, JsError> {
        render(&self.controller.handle(Event::Confirm))
    }

    #[wasm_bindgen(js_name = clickRow)]
    pub fn click_row(&mut self, row: usize) -> Result<JsValue, JsError> {
        render(&self.controller.handle(Event::RowClicked(row)))
    }

    pub fn cancel(&mut self) -> Result<JsValue, JsError> {
        render(&self.controller.handle(Event::Cancel))
    }

    pub fn quit(&mut self) -> Result<JsValue, JsError> {
        render(&self.controller.handle(Event::Quit))
    }

    #[wasm_bindgen(js_name = confirmQuit)]
    pub fn confirm_quit(&mut self) -> Result<JsValue, JsError> {
        render(&self.controller.handle(Event::QuitConfirmed))
    }

    /// Feeds a response body for the request with `ticket`.
    #[wasm_bindgen(js_name = receiveReply)]
    pub fn receive_reply(&mut self, ticket: f64, body: &str) -> Result<JsValue, JsError> {
        let reply = parse_response(body);
        render(&self.controller.handle(Event::OpponentReplied {
            ticket: ticket as u64,
            reply,
        }))
    }

    /// Reports that the request with `ticket` never produced a body.
    #[wasm_bindgen(js_name = replyFailed)]
    pub fn reply_failed(&mut self, ticket: f64, reason: String) -> Result<JsValue, JsError> {
        render(&self.controller.handle(Event::OpponentReplied {
            ticket: ticket as u64,
            reply: Err(OpponentError::Transport(reason)),
        }))
    }

    /// Accepts `"user"` or `"opponent"`.
    #[wasm_bindgen(js_name = setFirstMover)]
    pub fn set_first_mover(&mut self, first_mover: JsValue) -> Result<JsValue, JsError> {
        let first_mover: FirstMover =
            from_value(first_mover).map_err(|err| JsError::new(&err.to_string()))?;
        render(&self.controller.set_first_mover(first_mover))
    }

    #[wasm_bindgen(js_name = setSkill)]
    pub fn set_skill(&mut self, skill: u8) -> Result<JsValue, JsError> {
        render(&self.controller.set_skill(skill))
    }

    #[wasm_bindgen(js_name = endSession)]
    pub fn end_session(&mut self) -> Result<JsValue, JsError> {
        render(&self.controller.end_session())
    }
}
