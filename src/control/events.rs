// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Source events rendered as control notifications.

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::common::constants::methods;
use crate::jsonrpc::Notification;
use crate::stream::{SourceEvent, SourceNotice};

pub fn notification_for(event: &SourceEvent) -> Notification {
    match event {
        SourceEvent::StateChanged { source, status } => Notification::new(
            methods::STREAM_ON_UPDATE,
            json!({ "id": source, "status": status }),
        ),
        SourceEvent::Notice {
            source,
            notice: SourceNotice::Metadata { meta },
        } => Notification::new(
            methods::STREAM_ON_METADATA,
            json!({ "id": source, "meta": meta }),
        ),
        SourceEvent::Notice { source, notice } => {
            let mut params = json!({ "id": source });
            if let (Value::Object(params), Ok(Value::Object(fields))) =
                (&mut params, serde_json::to_value(notice))
            {
                params.extend(fields);
            }
            Notification::new(methods::STREAM_ON_ERROR, params)
        }
    }
}

/// Forward source events to the control session until either side closes.
pub fn spawn_event_forwarder(
    mut events: mpsc::Receiver<SourceEvent>,
    notifications: mpsc::Sender<Notification>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if notifications.send(notification_for(&event)).await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_notification() {
        let event = SourceEvent::Notice {
            source: "Spotify".into(),
            notice: SourceNotice::Metadata {
                meta: json!({"TITLE": "Song"}),
            },
        };
        let note = notification_for(&event);
        assert_eq!(note.method, "Stream.OnMetadata");
        assert_eq!(note.params, json!({"id": "Spotify", "meta": {"TITLE": "Song"}}));
    }

    #[test]
    fn test_error_notification_carries_kind() {
        let event = SourceEvent::Notice {
            source: "Spotify".into(),
            notice: SourceNotice::AuthenticationFailed {
                message: "Bad credentials".into(),
            },
        };
        let note = notification_for(&event);
        assert_eq!(note.method, "Stream.OnError");
        assert_eq!(
            note.params,
            json!({"id": "Spotify", "kind": "authentication_failed", "message": "Bad credentials"})
        );
    }
}
