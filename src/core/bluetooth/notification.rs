//! Notification handling for connected lighting modules
//! This module keeps one listening task per subscribed characteristic and
//! forwards every notified value into the session queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bluest::Characteristic;
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::events::{EventSender, PlatformEvent};
use crate::core::bluetooth::types::{CharacteristicHandle, PeripheralId};

/// Notification handler for characteristic value updates
#[derive(Clone)]
pub struct NotificationHandler {
    events: EventSender,
    subscriptions: Arc<Mutex<HashMap<CharacteristicHandle, CancellationToken>>>,
}

impl NotificationHandler {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts forwarding notifications of `characteristic`.
    pub fn subscribe(
        &self,
        peripheral: PeripheralId,
        handle: CharacteristicHandle,
        characteristic: Characteristic,
    ) {
        let cancel_token = {
            let mut subscriptions = self.subscriptions.lock().unwrap_or_else(|e| e.into_inner());
            if subscriptions.contains_key(&handle) {
                debug!("Characteristic {} already subscribed", handle);
                self.events.emit(PlatformEvent::NotificationStateChanged {
                    peripheral,
                    characteristic: handle,
                    enabled: true,
                    result: Ok(()),
                });
                return;
            }
            let token = CancellationToken::new();
            subscriptions.insert(handle, token.clone());
            token
        };

        let events = self.events.clone();
        let subscriptions = self.subscriptions.clone();

        tokio::spawn(async move {
            Self::process_notifications(
                peripheral,
                handle,
                characteristic,
                events,
                cancel_token.clone(),
            )
            .await;
            // a cancelled subscription was already removed by `unsubscribe`
            if !cancel_token.is_cancelled() {
                subscriptions
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&handle);
            }
        });
    }

    async fn process_notifications(
        peripheral: PeripheralId,
        handle: CharacteristicHandle,
        characteristic: Characteristic,
        events: EventSender,
        cancel_token: CancellationToken,
    ) {
        info!("Subscribing to notifications of {}...", characteristic.uuid());

        let mut notification_stream = match characteristic.notify().await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to subscribe to notifications: {}", e);
                events.emit(PlatformEvent::NotificationStateChanged {
                    peripheral,
                    characteristic: handle,
                    enabled: true,
                    result: Err(e.to_string()),
                });
                return;
            }
        };

        events.emit(PlatformEvent::NotificationStateChanged {
            peripheral: peripheral.clone(),
            characteristic: handle,
            enabled: true,
            result: Ok(()),
        });

        loop {
            tokio::select! {
                result = notification_stream.next() => {
                    match result {
                        Some(Ok(value)) => {
                            debug!("Notification from {}: {:?}", handle, value);
                            events.emit(PlatformEvent::CharacteristicValueUpdated {
                                peripheral: peripheral.clone(),
                                characteristic: handle,
                                value: Ok(value),
                            });
                        }
                        Some(Err(e)) => {
                            error!("Error in notification stream: {}", e);
                            events.emit(PlatformEvent::CharacteristicValueUpdated {
                                peripheral: peripheral.clone(),
                                characteristic: handle,
                                value: Err(e.to_string()),
                            });
                            break;
                        }
                        None => break,
                    }
                }
                _ = cancel_token.cancelled() => {
                    events.emit(PlatformEvent::NotificationStateChanged {
                        peripheral: peripheral.clone(),
                        characteristic: handle,
                        enabled: false,
                        result: Ok(()),
                    });
                    break;
                }
            }
        }

        info!("Notification stream of {} ended", handle);
    }

    /// Stops forwarding notifications of `handle`. Dropping the stream unsubscribes.
    pub fn unsubscribe(&self, peripheral: PeripheralId, handle: CharacteristicHandle) {
        let token = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle);
        match token {
            Some(token) => token.cancel(),
            None => self.events.emit(PlatformEvent::NotificationStateChanged {
                peripheral,
                characteristic: handle,
                enabled: false,
                result: Ok(()),
            }),
        }
    }

    pub fn stop_all(&self) {
        let mut subscriptions = self.subscriptions.lock().unwrap_or_else(|e| e.into_inner());
        for (_, token) in subscriptions.drain() {
            token.cancel();
        }
    }
}
