use serde_json::Value;

use super::frame::{Call, CallError, CallResult, CallResultError, Send};

pub const CALL: u64 = 2;
pub const CALL_RESULT: u64 = 3;
pub const CALL_ERROR: u64 = 4;
pub const CALL_RESULT_ERROR: u64 = 5;
pub const SEND: u64 = 6;

#[derive(Debug, Clone)]
pub struct Invalid {
    pub unique_id: Option<String>,
    pub message: String,
    pub err_msg: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallResponse<T> {
    CallResult(CallResult),
    CallError(CallError<T>),
}

#[derive(Debug, Clone)]
pub enum OcppMessage<T> {
    Call(Call),
    CallResponse(CallResponse<T>),
    CallResultError(CallResultError<T>),
    Send(Send),
    Invalid(Invalid),
}

pub trait EncodeDecode {
    fn encode(&self) -> String;
}

impl<T> CallResponse<T> {
    pub fn get_unique_id(&self) -> String {
        match self {
            CallResponse::CallResult(t) => t.unique_id.clone(),
            CallResponse::CallError(t) => t.unique_id.clone(),
        }
    }
}

impl<T> OcppMessage<T> {
    pub fn get_unique_id(&self) -> Option<&str> {
        match self {
            OcppMessage::Call(t) => Some(&t.unique_id),
            OcppMessage::CallResponse(CallResponse::CallResult(t)) => Some(&t.unique_id),
            OcppMessage::CallResponse(CallResponse::CallError(t)) => Some(&t.unique_id),
            OcppMessage::CallResultError(t) => Some(&t.unique_id),
            OcppMessage::Send(t) => Some(&t.unique_id),
            OcppMessage::Invalid(t) => t.unique_id.as_deref(),
        }
    }
}

fn invalid<T>(unique_id: Option<String>, message: String, err_msg: &str) -> OcppMessage<T> {
    OcppMessage::Invalid(Invalid {
        unique_id,
        message,
        err_msg: err_msg.into(),
    })
}

fn error_parts<T: serde::de::DeserializeOwned>(arr: &[Value]) -> Option<(String, T, String, Value)> {
    let unique_id = arr[1].as_str()?.to_string();
    let error_code = serde_json::from_value::<T>(arr[2].clone()).ok()?;
    let error_description = arr[3].as_str()?.to_string();
    Some((unique_id, error_code, error_description, arr[4].clone()))
}

impl<T: serde::de::DeserializeOwned> OcppMessage<T> {
    pub fn decode(message: String) -> OcppMessage<T> {
        let raw: Value = match serde_json::from_str(&message) {
            Ok(val) => val,
            Err(e) => {
                return OcppMessage::Invalid(Invalid {
                    unique_id: None,
                    message,
                    err_msg: format!("JSON parse error: {}", e),
                });
            }
        };

        let arr = match raw {
            Value::Array(arr) => arr,
            _ => return invalid(None, message, "Expected JSON array"),
        };
        let unique_id = arr.get(1).and_then(|v| v.as_str()).map(|s| s.to_string());

        match arr.first().and_then(|v| v.as_u64()) {
            Some(kind @ (CALL | SEND)) if arr.len() == 4 => {
                let action = arr[2].as_str().map(|s| s.to_string());
                let payload = arr[3].clone();

                match (unique_id, action) {
                    (Some(unique_id), Some(action)) if kind == CALL => OcppMessage::Call(Call {
                        unique_id,
                        action,
                        payload,
                    }),
                    (Some(unique_id), Some(action)) => OcppMessage::Send(Send {
                        unique_id,
                        action,
                        payload,
                    }),
                    (unique_id, _) => invalid(unique_id, message, "Invalid Call structure"),
                }
            }

            Some(CALL_RESULT) if arr.len() == 3 => match unique_id {
                Some(unique_id) => OcppMessage::CallResponse(CallResponse::CallResult(CallResult {
                    unique_id,
                    payload: arr[2].clone(),
                })),
                None => invalid(None, message, "Invalid CallResult structure"),
            },

            Some(CALL_ERROR) if arr.len() == 5 => match error_parts::<T>(&arr) {
                Some((unique_id, error_code, error_description, error_details)) => {
                    OcppMessage::CallResponse(CallResponse::CallError(CallError {
                        unique_id,
                        error_code,
                        error_description,
                        error_details,
                    }))
                }
                None => invalid(unique_id, message, "Invalid CallError structure"),
            },

            Some(CALL_RESULT_ERROR) if arr.len() == 5 => match error_parts::<T>(&arr) {
                Some((unique_id, error_code, error_description, error_details)) => {
                    OcppMessage::CallResultError(CallResultError {
                        unique_id,
                        error_code,
                        error_description,
                        error_details,
                    })
                }
                None => invalid(unique_id, message, "Invalid CallResultError structure"),
            },

            _ => invalid(unique_id, message, "Unknown or malformed message"),
        }
    }
}

impl EncodeDecode for Call {
    fn encode(&self) -> String {
        Value::Array(vec![
            CALL.into(),
            self.unique_id.clone().into(),
            self.action.clone().into(),
            self.payload.clone(),
        ])
        .to_string()
    }
}

impl EncodeDecode for Send {
    fn encode(&self) -> String {
        Value::Array(vec![
            SEND.into(),
            self.unique_id.clone().into(),
            self.action.clone().into(),
            self.payload.clone(),
        ])
        .to_string()
    }
}

impl EncodeDecode for CallResult {
    fn encode(&self) -> String {
        Value::Array(vec![CALL_RESULT.into(), self.unique_id.clone().into(), self.payload.clone()]).to_string()
    }
}

fn encode_error<T: ToString>(kind: u64, unique_id: &str, code: &T, description: &str, details: &Value) -> String {
    Value::Array(vec![
        kind.into(),
        unique_id.into(),
        code.to_string().into(),
        description.into(),
        details.clone(),
    ])
    .to_string()
}

impl<T: ToString> EncodeDecode for CallError<T> {
    fn encode(&self) -> String {
        encode_error(CALL_ERROR, &self.unique_id, &self.error_code, &self.error_description, &self.error_details)
    }
}

impl<T: ToString> EncodeDecode for CallResultError<T> {
    fn encode(&self) -> String {
        encode_error(
            CALL_RESULT_ERROR,
            &self.unique_id,
            &self.error_code,
            &self.error_description,
            &self.error_details,
        )
    }
}

impl<T: ToString> EncodeDecode for CallResponse<T> {
    fn encode(&self) -> String {
        match self {
            CallResponse::CallResult(t) => t.encode(),
            CallResponse::CallError(t) => t.encode(),
        }
    }
}
