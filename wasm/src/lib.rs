use blindquiz_core::{
    address_to_field, field_to_decimal, field_to_le_hex, serialize_proof, serialize_public_signal, serialize_vkey,
    PointEncoder, SnarkjsProof, SnarkjsVkey, TryAndIncrement,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Install panic hook so WASM panics show in browser console instead of silently freezing.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Answer point in both the circuit form (decimal) and the ledger form (LE hex).
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct JsPoint {
    x: String,
    y: String,
    x_le_hex: String,
    y_le_hex: String,
}

fn encode_answer(answer: &str) -> Result<JsPoint, String> {
    let p = TryAndIncrement.encode(answer).map_err(|e| e.to_string())?;
    Ok(JsPoint {
        x: p.x_decimal(),
        y: p.y_decimal(),
        x_le_hex: field_to_le_hex(&p.x()),
        y_le_hex: field_to_le_hex(&p.y()),
    })
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsError::new(&e.to_string()))
}

/// snarkjs proof JSON -> `{ a, b, c }` compressed hex.
#[wasm_bindgen]
pub fn proof_serialize_by_parts(proof_json: &str) -> Result<JsValue, JsError> {
    let proof: SnarkjsProof = serde_json::from_str(proof_json)?;
    to_js(&serialize_proof(&proof)?)
}

/// Decimal public signal -> 32-byte little-endian hex.
#[wasm_bindgen]
pub fn public_input_serialize(signal: &str) -> Result<String, JsError> {
    Ok(serialize_public_signal(signal)?)
}

#[wasm_bindgen]
pub fn vkey_serialize_by_parts(vkey_json: &str) -> Result<JsValue, JsError> {
    let vk: SnarkjsVkey = serde_json::from_str(vkey_json)?;
    to_js(&serialize_vkey(&vk)?)
}

/// Answer string -> `{ x, y, xLeHex, yLeHex }`.
#[wasm_bindgen]
pub fn string_to_curve(answer: &str) -> Result<JsValue, JsError> {
    let point = encode_answer(answer).map_err(|e| JsError::new(&e))?;
    to_js(&point)
}

/// Account address -> decimal field element for the `address` circuit input.
#[wasm_bindgen]
pub fn addr_to_field(address: &str) -> Result<String, JsError> {
    Ok(field_to_decimal(&address_to_field(address)?))
}
