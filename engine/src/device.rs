//! Device/Status Reporter.
//!
//! Turns device-property queries into a [`DeviceStatus`] suitable for
//! display. Failures are reduced to a category label; raw tool output is
//! never shown.

use tracing::debug;

use crate::invoker::ProcessInvoker;
use crate::listing::property_args;
use crate::model::{DeviceState, DeviceStatus, ErrorKind, TransferResult};

/// Marketing name, e.g. `Galaxy S23`. Empty on many devices.
pub const MARKET_NAME_PROPERTY: &str = "ro.product.bootimage.marketname";

/// Model name, e.g. `SM-S911B`.
pub const MODEL_PROPERTY: &str = "ro.product.model";

/// Label used when the device answers but reports no usable name.
pub const FALLBACK_DEVICE_LABEL: &str = "Connected Device";

/// Query the connected device and classify the outcome.
pub async fn query_status(invoker: &dyn ProcessInvoker) -> DeviceStatus {
    let market = invoker.query(&property_args(MARKET_NAME_PROPERTY)).await;
    if !market.success || non_empty(&market).is_some() {
        return status_from_result(&market);
    }

    debug!("market name empty, falling back to model");
    let model = invoker.query(&property_args(MODEL_PROPERTY)).await;
    status_from_result(&model)
}

/// Status for a single property query result.
///
/// Results decoded with [`TransferResult::from_json`] carry
/// `PARSE_FAILURE` when the payload was not JSON, which gets its own label.
pub fn status_from_result(result: &TransferResult) -> DeviceStatus {
    if result.success {
        connected(non_empty(result).unwrap_or(FALLBACK_DEVICE_LABEL))
    } else {
        status_from_failure(result)
    }
}

fn status_from_failure(result: &TransferResult) -> DeviceStatus {
    let kind = match (result.error, result.detail.as_deref()) {
        (Some(kind), _) => kind,
        (None, Some(detail)) if !detail.is_empty() => ErrorKind::classify(detail),
        (None, _) => ErrorKind::ProcessFailure,
    };
    let (state, label) = match kind {
        ErrorKind::Unauthorized => (DeviceState::Unauthorized, "Device Unauthorized"),
        ErrorKind::Offline | ErrorKind::Timeout => (DeviceState::Offline, "Device offline or missing"),
        ErrorKind::ParseFailure => (DeviceState::Offline, "Error parsing ADB status"),
        ErrorKind::ProcessFailure | ErrorKind::ProbeFailure => (DeviceState::Offline, "Error connecting"),
    };
    DeviceStatus {
        state,
        label: label.to_string(),
    }
}

fn non_empty(result: &TransferResult) -> Option<&str> {
    let name = result.data_or_empty().trim();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn connected(name: &str) -> DeviceStatus {
    DeviceStatus {
        state: DeviceState::Connected,
        label: name.to_string(),
    }
}
