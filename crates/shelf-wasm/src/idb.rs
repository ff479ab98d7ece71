//! IndexedDB-backed [`RecordStore`].
//!
//! One object store with an auto-incrementing `id` key path. The connection is opened lazily
//! on first use and kept by the store value; clones share it.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;
use log::{debug, info, warn};
use serde_json::Value as JsonValue;
use shelf_core::record::ID_FIELD;
use shelf_core::{DatabaseConfig, Record, RecordId, RecordStore, StoreError};
use thiserror::Error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    IdbDatabase, IdbObjectStore, IdbObjectStoreParameters, IdbOpenDbRequest, IdbRequest,
    IdbTransaction, IdbTransactionMode, IdbVersionChangeEvent,
};

use crate::dom::window;
use crate::events::EventFuture;

#[derive(Debug, Error)]
pub enum IdbError {
    #[error("IndexedDB is not available in this context")]
    Unavailable,
    /// A failure reported by the browser; handed back to JS untouched.
    #[error("IndexedDB error: {0:?}")]
    Js(JsValue),
    #[error("IndexedDB callback dropped before completion")]
    Canceled(#[from] oneshot::Canceled),
    #[error("transaction aborted")]
    Aborted,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<JsValue> for IdbError {
    fn from(value: JsValue) -> Self {
        IdbError::Js(value)
    }
}

impl From<IdbError> for JsValue {
    fn from(err: IdbError) -> Self {
        match err {
            IdbError::Js(value) => value,
            other => {
                let js = js_sys::Error::new(&other.to_string());
                js.set_name("IdbError");
                js.into()
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct IdbRecordStore {
    config: DatabaseConfig,
    db: Rc<RefCell<Option<IdbDatabase>>>,
    /// `versionchange` handler of the current connection; replaced on reopen.
    on_version_change: Rc<RefCell<Option<VersionChangeHandler>>>,
}

type VersionChangeHandler = Closure<dyn FnMut(IdbVersionChangeEvent)>;

impl IdbRecordStore {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            db: Rc::new(RefCell::new(None)),
            on_version_change: Rc::new(RefCell::new(None)),
        }
    }

    /// Returns the open connection, opening (and creating the schema) on first use.
    ///
    /// When two calls race through the first open, the connection that lands second is closed
    /// and the first one is shared.
    async fn database(&self) -> Result<IdbDatabase, IdbError> {
        if let Some(db) = self.db.borrow().clone() {
            return Ok(db);
        }
        let db = open_database(&self.config).await?;
        if let Some(existing) = self.db.borrow().clone() {
            db.close();
            return Ok(existing);
        }

        // Another tab upgrading the schema needs this connection closed; the next call reopens.
        let slot = self.db.clone();
        let on_version_change = VersionChangeHandler::new(move |_: IdbVersionChangeEvent| {
            if let Some(db) = slot.borrow_mut().take() {
                db.close();
                info!("event=idb_version_change status=closed");
            }
        });
        db.set_onversionchange(Some(on_version_change.as_ref().unchecked_ref()));
        // The previous handler belongs to a closed connection and never fires again.
        self.on_version_change.replace(Some(on_version_change));

        *self.db.borrow_mut() = Some(db.clone());
        Ok(db)
    }

    async fn object_store(
        &self,
        mode: IdbTransactionMode,
    ) -> Result<(IdbTransaction, IdbObjectStore), IdbError> {
        let db = self.database().await?;
        let tx = db.transaction_with_str_and_mode(&self.config.store, mode)?;
        let store = tx.object_store(&self.config.store)?;
        Ok((tx, store))
    }

    /// Runs one write request and resolves once its transaction has committed.
    async fn write<F>(&self, op: &'static str, issue: F) -> Result<JsValue, IdbError>
    where
        F: FnOnce(&IdbObjectStore) -> Result<IdbRequest, JsValue>,
    {
        let (tx, store) = self.object_store(IdbTransactionMode::Readwrite).await?;
        let committed = EventFuture::new(&tx, &["complete", "error", "abort"])?;
        let request = issue(&store)?;
        let result = await_request(&request).await?;
        await_transaction(&tx, committed).await?;
        debug!("event=idb_write op={op} store={} status=ok", self.config.store);
        Ok(result)
    }
}

impl RecordStore for IdbRecordStore {
    type Error = IdbError;

    async fn get_all(&self) -> Result<Vec<Record>, IdbError> {
        let (_tx, store) = self.object_store(IdbTransactionMode::Readonly).await?;
        let request = store.get_all()?;
        let values: js_sys::Array = await_request(&request).await?.dyn_into()?;

        let mut records = Vec::with_capacity(values.length() as usize);
        for value in values.iter() {
            records.push(record_from_js(&value)?);
        }
        debug!("event=idb_get_all store={} count={}", self.config.store, records.len());
        Ok(records)
    }

    async fn add(&self, mut record: Record) -> Result<RecordId, IdbError> {
        record.id = None;
        let value = record_to_js(&record)?;
        let key = self.write("add", |store| store.add(&value)).await?;
        key_to_id(&key)
    }

    async fn put(&self, record: Record) -> Result<RecordId, IdbError> {
        let id = record
            .id
            .ok_or_else(|| StoreError::Malformed("record has no `id` field".to_string()))?;
        let value = record_to_js(&record)?;
        self.write("put", |store| store.put(&value)).await?;
        Ok(id)
    }

    async fn delete(&self, id: RecordId) -> Result<(), IdbError> {
        let key = JsValue::from_f64(id.as_f64());
        self.write("delete", |store| store.delete(&key)).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), IdbError> {
        self.write("clear", |store| store.clear()).await?;
        Ok(())
    }
}

async fn open_database(config: &DatabaseConfig) -> Result<IdbDatabase, IdbError> {
    let factory = window()?.indexed_db()?.ok_or(IdbError::Unavailable)?;
    let request: IdbOpenDbRequest = factory.open_with_u32(&config.name, config.version)?;

    let store_name = config.store.clone();
    let on_upgrade = Closure::<dyn FnMut(IdbVersionChangeEvent)>::new(move |event: IdbVersionChangeEvent| {
        match create_object_store(&event, &store_name) {
            Ok(true) => info!(
                "event=idb_upgrade store={store_name} old_version={} status=created",
                event.old_version()
            ),
            Ok(false) => {}
            Err(err) => warn!("event=idb_upgrade store={store_name} status=failed error={err:?}"),
        }
    });
    request.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));

    let opened = await_request(&request).await;
    request.set_onupgradeneeded(None);
    drop(on_upgrade);

    let db: IdbDatabase = opened?.dyn_into()?;
    info!(
        "event=idb_open name={} version={} status=ok",
        config.name, config.version
    );
    Ok(db)
}

/// Creates the record store when the upgrading database lacks it.
fn create_object_store(event: &IdbVersionChangeEvent, name: &str) -> Result<bool, JsValue> {
    let request: IdbOpenDbRequest = event
        .target()
        .ok_or_else(|| JsValue::from_str("upgrade event has no target"))?
        .dyn_into()?;
    let db: IdbDatabase = request.result()?.dyn_into()?;
    if db.object_store_names().contains(name) {
        return Ok(false);
    }

    let params = IdbObjectStoreParameters::new();
    params.set_key_path(&JsValue::from_str(ID_FIELD));
    params.set_auto_increment(true);
    db.create_object_store_with_optional_parameters(name, &params)?;
    Ok(true)
}

async fn await_request(request: &IdbRequest) -> Result<JsValue, IdbError> {
    let (event, _) = EventFuture::new(request, &["success", "error"])?.wait().await?;
    if event == "success" {
        return Ok(request.result()?);
    }
    Err(match request.error()? {
        Some(exception) => IdbError::Js(exception.into()),
        None => IdbError::Js(js_sys::Error::new("IndexedDB request failed").into()),
    })
}

async fn await_transaction(tx: &IdbTransaction, committed: EventFuture) -> Result<(), IdbError> {
    let (event, _) = committed.wait().await?;
    match (event, tx.error()) {
        ("complete", _) => Ok(()),
        (_, Some(exception)) => Err(IdbError::Js(exception.into())),
        _ => Err(IdbError::Aborted),
    }
}

fn record_to_js(record: &Record) -> Result<JsValue, IdbError> {
    let json = record.to_json_string()?;
    Ok(js_sys::JSON::parse(&json)?)
}

fn record_from_js(value: &JsValue) -> Result<Record, IdbError> {
    let json: String = js_sys::JSON::stringify(value)?.into();
    let record = serde_json::from_str(&json).map_err(StoreError::from)?;
    Ok(record)
}

fn key_to_id(key: &JsValue) -> Result<RecordId, IdbError> {
    key.as_f64()
        .and_then(|n| RecordId::from_json(&JsonValue::from(n)))
        .ok_or_else(|| {
            IdbError::Store(StoreError::Backend(format!(
                "key generator returned a non-integer key: {key:?}"
            )))
        })
}
