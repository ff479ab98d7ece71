use js_sys::Promise;
use log::debug;
use serde_json::Value as JsonValue;
use shelf_core::store::{add_json, get_all_json, put_json};
use shelf_core::{RecordId, RecordStore};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::idb::IdbRecordStore;
use crate::options::shelf_config;

/// Record storage session backed by IndexedDB.
///
/// Every method returns a promise. Records cross the boundary as JSON strings.
#[wasm_bindgen]
pub struct RecordDb {
    store: IdbRecordStore,
}

#[wasm_bindgen]
impl RecordDb {
    /// `config` is an optional `ShelfConfig`-shaped object; only its `database` section is used.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<RecordDb, JsValue> {
        let config = shelf_config(config)?;
        Ok(RecordDb {
            store: IdbRecordStore::new(config.database),
        })
    }

    /// Resolves to a JSON array string of every record.
    #[wasm_bindgen(js_name = "getAll")]
    pub fn get_all(&self) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let json = get_all_json(&store).await?;
            Ok(JsValue::from_str(&json))
        })
    }

    /// Inserts a record (any `id` it carries is dropped) and resolves to the new id.
    pub fn add(&self, json: String) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let id = add_json(&store, &json).await?;
            Ok(JsValue::from_f64(id.as_f64()))
        })
    }

    /// Upserts a record by its `id` and resolves to `true`.
    pub fn update(&self, json: String) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            put_json(&store, &json).await?;
            Ok(JsValue::TRUE)
        })
    }

    /// Deletes by id and resolves to `true`; unknown ids are a no-op.
    pub fn delete(&self, id: f64) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            match RecordId::from_json(&JsonValue::from(id)) {
                Some(id) => store.delete(id).await?,
                // No key generator hands out such a key, so nothing can be stored under it.
                None => debug!("event=record_delete status=skipped reason=invalid_id id={id}"),
            }
            Ok(JsValue::TRUE)
        })
    }

    /// Removes every record and resolves to `true`.
    pub fn clear(&self) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store.clear().await?;
            Ok(JsValue::TRUE)
        })
    }
}
