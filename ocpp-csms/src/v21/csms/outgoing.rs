use ocpp21_core::{
    format::envelope::{Request, Response},
    v21::messages::{
        change_availability::{ChangeAvailabilityRequest, ChangeAvailabilityResponse},
        clear_cache::{ClearCacheRequest, ClearCacheResponse},
        data_transfer::{DataTransferRequest, DataTransferResponse},
        request_start_transaction::{RequestStartTransactionRequest, RequestStartTransactionResponse},
        request_stop_transaction::{RequestStopTransactionRequest, RequestStopTransactionResponse},
        reset::{ResetRequest, ResetResponse},
        trigger_message::{TriggerMessageRequest, TriggerMessageResponse},
        unlock_connector::{UnlockConnectorRequest, UnlockConnectorResponse},
    },
};
use tokio_util::sync::CancellationToken;

use super::Csms;

macro_rules! outgoing {
    ($($(#[$doc:meta])* $name:ident => $req:ty, $res:ty;)+) => {
        impl Csms {
            $(
                $(#[$doc])*
                pub async fn $name(&self, request: Request<$req>, cancel: CancellationToken) -> Response<$res> {
                    self.router.send(request, cancel).await
                }
            )+
        }
    };
}

outgoing! {
    reset => ResetRequest, ResetResponse;
    change_availability => ChangeAvailabilityRequest, ChangeAvailabilityResponse;
    unlock_connector => UnlockConnectorRequest, UnlockConnectorResponse;
    /// Asks the station to send one of its own messages now.
    trigger_message => TriggerMessageRequest, TriggerMessageResponse;
    clear_cache => ClearCacheRequest, ClearCacheResponse;
    request_start_transaction => RequestStartTransactionRequest, RequestStartTransactionResponse;
    request_stop_transaction => RequestStopTransactionRequest, RequestStopTransactionResponse;
    data_transfer => DataTransferRequest, DataTransferResponse;
}
