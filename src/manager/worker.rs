//! The batch worker: drives every transfer of one batch to completion.
//!
//! The worker owns the transport for the lifetime of the batch and is the
//! only thread touching it. It takes the engine lock only for setup and
//! config snapshots, never across a transport poll or a callback
//! invocation. Exactly one terminal callback is emitted per batch, after
//! cleanup has run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::callbacks::Callbacks;
use super::error::TransferError;
use super::options::Options;
use super::{Config, EngineState, MIN_TRANSFER_SPEED};
use crate::net::{Direction, Scheme, SharedRequest};
use crate::transport::{
    Credentials, TransferFailure, TransferPlan, Transport, TransportError, TransportFactory,
};

/// Upper bound on one readiness wait; also the cadence at which the worker
/// observes the cancel flag and republishes aggregate progress.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Batch worker entry point.
pub(crate) fn run(
    state: Arc<Mutex<EngineState>>,
    factory: Arc<TransportFactory>,
    cancel: Arc<AtomicBool>,
) {
    let direction = {
        let guard = state.lock().unwrap();
        match guard.batch.as_ref() {
            Some(batch) => batch.direction,
            None => return,
        }
    };

    emit_started(&state, direction);

    let mut transport = factory();
    let result = drive_batch(transport.as_mut(), &state, &cancel, direction);

    // Cleanup always runs, whatever the loop decided: destroy every
    // transfer, then drop the batch's request list.
    transport.discard_all();
    if let Ok(mut guard) = state.lock() {
        guard.batch = None;
    }

    match result {
        Ok(()) => emit_completed(&state, direction),
        Err(code) => emit_failed(&state, direction, code),
    }
}

fn drive_batch(
    transport: &mut dyn Transport,
    state: &Arc<Mutex<EngineState>>,
    cancel: &Arc<AtomicBool>,
    direction: Direction,
) -> Result<(), TransferError> {
    let requests = prepare(transport, state, cancel)?;
    let todo = requests.len();
    let mut done = 0usize;

    transport.drive().map_err(internal)?;

    while done < todo {
        transport.await_activity(POLL_INTERVAL).map_err(internal)?;

        if cancel.load(Ordering::Relaxed) {
            warn!(?direction, "abort observed, terminating batch");
            return Err(TransferError::UserAbort);
        }

        transport.drive().map_err(internal)?;
        publish_progress(state, &requests, direction);
        triage(transport, state, &requests, &mut done)?;
    }

    Ok(())
}

/// Launches one transfer per request, under the engine lock.
fn prepare(
    transport: &mut dyn Transport,
    state: &Arc<Mutex<EngineState>>,
    cancel: &Arc<AtomicBool>,
) -> Result<Vec<SharedRequest>, TransferError> {
    let guard = state.lock().unwrap();
    let config = guard.config.clone();
    let requests = match guard.batch.as_ref() {
        Some(batch) => batch.requests.clone(),
        None => return Err(TransferError::Internal),
    };

    for (slot, shared) in requests.iter().enumerate() {
        let plan = build_plan(&config, shared);
        transport
            .launch(slot, &plan, Arc::clone(shared), Arc::clone(cancel))
            .map_err(|err| {
                error!(slot, %err, "failed to prepare transfer");
                TransferError::Internal
            })?;
    }

    drop(guard);
    Ok(requests)
}

/// Builds the per-transfer configuration from a request and a config
/// snapshot. Credentials go to FTP/FTPS targets only; directory creation
/// applies to FTP uploads when the option is set.
fn build_plan(config: &Config, shared: &SharedRequest) -> TransferPlan {
    let request = shared.lock().unwrap();
    let url = request.url();
    let direction = request.direction();

    let credentials = match url.scheme() {
        Scheme::Ftp | Scheme::Ftps => Some(Credentials {
            username: config.username.clone(),
            password: config.password.clone(),
        }),
        _ => None,
    };

    TransferPlan {
        url: url.to_url_string(),
        direction,
        credentials,
        connect_timeout: config.timeout_connect,
        low_speed_limit: MIN_TRANSFER_SPEED,
        low_speed_time: config.timeout_transfer,
        upload_size: if direction == Direction::Upload {
            request.payload().len() as u64
        } else {
            0
        },
        create_missing_dirs: direction == Direction::Upload
            && matches!(url.scheme(), Scheme::Ftp | Scheme::Ftps)
            && config.options.contains(Options::FTP_CREATE_DIRS),
    }
}

/// Sums the byte counters across the batch and emits `progress`.
fn publish_progress(
    state: &Arc<Mutex<EngineState>>,
    requests: &[SharedRequest],
    direction: Direction,
) {
    let mut total = 0u64;
    let mut current = 0u64;
    for shared in requests {
        let request = shared.lock().unwrap();
        total += request.size_total();
        current += request.size_current();
    }

    (snapshot_callbacks(state).progress)(direction, total, current);
}

/// Drains the completion queue: counts successes, ends the batch on a
/// non-retryable failure, and relaunches retryable failures that still
/// have trial budget.
fn triage(
    transport: &mut dyn Transport,
    state: &Arc<Mutex<EngineState>>,
    requests: &[SharedRequest],
    done: &mut usize,
) -> Result<(), TransferError> {
    for outcome in transport.harvest() {
        let failure = match outcome.result {
            Ok(()) => {
                *done += 1;
                continue;
            }
            Err(failure) => failure,
        };

        let Some(shared) = requests.get(outcome.slot) else {
            error!(slot = outcome.slot, "completion for unknown transfer slot");
            return Err(TransferError::Internal);
        };

        if let Some(code) = terminal_code(&failure) {
            let url = shared.lock().unwrap().url().to_url_string();
            if code == TransferError::UserAbort {
                warn!(%url, "transfer aborted by caller");
            } else {
                error!(%url, %failure, code = code.as_str(), "transfer failed, terminating batch");
            }
            return Err(code);
        }

        // Retryable failure: spend one trial if any is left.
        let config = state.lock().unwrap().config.clone();
        let (trials, url) = {
            let request = shared.lock().unwrap();
            (request.trials(), request.url().to_url_string())
        };

        if trials >= config.max_trials {
            warn!(%url, %failure, trials, "reached maximum number of trials");
            return Err(TransferError::MaxTrials);
        }

        debug!(%url, %failure, trial = trials + 1, "performing new trial for request");
        {
            let mut request = shared.lock().unwrap();
            request.register_trial();
            request.rewind_for_retry();
        }

        let plan = build_plan(&config, shared);
        transport.relaunch(outcome.slot, &plan).map_err(internal)?;
    }

    Ok(())
}

/// Terminal error for a non-retryable failure, `None` when the failure is
/// eligible for a retry.
fn terminal_code(failure: &TransferFailure) -> Option<TransferError> {
    match failure {
        TransferFailure::Internal(_) => Some(TransferError::Internal),
        TransferFailure::RemoteStorageFull => Some(TransferError::MemoryFullRemote),
        TransferFailure::MalformedUrl => Some(TransferError::InvalidRequest),
        TransferFailure::ContentNotFound => Some(TransferError::ContentNotFound),
        TransferFailure::LoginDenied => Some(TransferError::InvalidLogin),
        TransferFailure::TlsHandshake => Some(TransferError::InvalidSsl),
        TransferFailure::Aborted => Some(TransferError::UserAbort),
        TransferFailure::HostNotFound
        | TransferFailure::ConnectionRefused
        | TransferFailure::Other(_) => None,
    }
}

fn internal(error: TransportError) -> TransferError {
    error!(%error, "transport malfunction while driving batch");
    TransferError::Internal
}

fn snapshot_callbacks(state: &Arc<Mutex<EngineState>>) -> Callbacks {
    state.lock().unwrap().callbacks.clone()
}

fn emit_started(state: &Arc<Mutex<EngineState>>, direction: Direction) {
    (snapshot_callbacks(state).started)(direction);
}

fn emit_completed(state: &Arc<Mutex<EngineState>>, direction: Direction) {
    (snapshot_callbacks(state).completed)(direction);
}

fn emit_failed(state: &Arc<Mutex<EngineState>>, direction: Direction, code: TransferError) {
    (snapshot_callbacks(state).failed)(direction, code);
}
