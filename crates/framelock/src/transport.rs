//! JACK transport clock shim.
//!
//! The player registers as a JACK client purely to read the transport: the
//! shared sample counter and the rolling flag. No ports, no process
//! callback. The client stays active for the process lifetime and is closed
//! by drop.

use jack::{Client, ClientOptions, ClientStatus, TransportState};

use framelock_core::{PlayerError, TransportClock};

pub struct JackTransport {
    // the async client keeps the JACK connection alive; deactivated on drop
    client: jack::AsyncClient<(), ()>,
    sample_rate: u32,
}

impl JackTransport {
    /// Connects to a running JACK server. Fails if none is reachable; the
    /// player cannot run without its clock.
    pub fn open(client_name: &str) -> Result<Self, PlayerError> {
        let (client, status) = Client::new(client_name, ClientOptions::NO_START_SERVER)
            .map_err(|e| {
                PlayerError::ClockUnavailable(format!(
                    "failed to open JACK client (is the server running?): {e}"
                ))
            })?;

        if status.contains(ClientStatus::NAME_NOT_UNIQUE) {
            tracing::debug!(name = client.name(), "client name was taken, server assigned another");
        }

        let sample_rate = client.sample_rate() as u32;
        let client = client.activate_async((), ()).map_err(|e| {
            PlayerError::ClockUnavailable(format!("cannot activate JACK client: {e}"))
        })?;

        tracing::info!(sample_rate, "JACK transport client initialized");
        Ok(Self {
            client,
            sample_rate,
        })
    }
}

impl TransportClock for JackTransport {
    fn frame_counter(&self) -> u64 {
        self.client
            .as_client()
            .transport()
            .query()
            .map(|tsp| u64::from(tsp.pos.frame()))
            .unwrap_or(0)
    }

    fn is_rolling(&self) -> bool {
        self.client
            .as_client()
            .transport()
            .query_state()
            .map(|state| state == TransportState::Rolling)
            .unwrap_or(false)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
