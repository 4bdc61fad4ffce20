#![cfg(target_arch = "wasm32")]

use matchtaker::wasm::MatchTaker;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn ok<T>(result: Result<T, wasm_bindgen::JsError>) -> T {
    match result {
        Ok(value) => value,
        Err(_) => panic!("facade call failed"),
    }
}

fn field(view: &JsValue, name: &str) -> JsValue {
    js_sys::Reflect::get(view, &JsValue::from_str(name)).expect("view is an object")
}

#[wasm_bindgen_test]
fn facade_runs_a_turn_against_the_heuristic() {
    let mut session = ok(MatchTaker::new(JsValue::UNDEFINED, None));
    ok(session.end_session());

    let view = ok(session.start_or_confirm());
    assert_eq!(field(&view, "state").as_string().as_deref(), Some("user_turn"));

    ok(session.click_row(4));
    let view = ok(session.start_or_confirm());

    assert_eq!(field(&view, "state").as_string().as_deref(), Some("user_turn"));
    let piles = js_sys::Array::from(&field(&view, "piles"));
    assert_eq!(piles.get(4).as_f64(), Some(1.0));
}

#[wasm_bindgen_test]
fn facade_survives_a_reload() {
    let mut first = ok(MatchTaker::new(JsValue::UNDEFINED, None));
    ok(first.end_session());
    ok(first.start_or_confirm());
    ok(first.click_row(2));
    drop(first);

    let second = ok(MatchTaker::new(JsValue::UNDEFINED, None));
    let view = ok(second.view());

    assert_eq!(field(&view, "state").as_string().as_deref(), Some("selecting_row"));
    assert_eq!(field(&view, "selected_row").as_f64(), Some(2.0));
}

#[wasm_bindgen_test]
fn remote_mode_without_a_send_function_is_rejected() {
    let config = js_sys::JSON::parse(r#"{"opponent": "remote"}"#).expect("json");
    assert!(MatchTaker::new(config, None).is_err());
}

#[wasm_bindgen_test]
fn config_may_be_given_as_json_text() {
    // Settings stored by earlier sessions would override the config.
    web_sys::window()
        .and_then(|window| window.session_storage().ok().flatten())
        .expect("session storage")
        .clear()
        .expect("storage cleared");
    let config = JsValue::from_str(r#"{"first_mover": "opponent", "skill": 0}"#);
    let session = ok(MatchTaker::new(config, None));
    let view = ok(session.view());

    assert_eq!(field(&view, "first_mover").as_string().as_deref(), Some("opponent"));
    assert_eq!(field(&view, "skill").as_f64(), Some(0.0));
}
