//! Drive the extractor through the method-call dispatcher.
//!
//! Usage:
//!   cargo run --example method_call -- <input_file>

use std::time::Duration;

use crossbeam_channel::unbounded;
use serde_json::json;
use video_frame_extractor::{Dispatcher, DispatcherConfig, MethodCall, MethodResponse, MethodValue};

fn main() {
    let input_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "input.mp4".to_string());

    let dispatcher = Dispatcher::new()
        .with_config(DispatcherConfig::new().with_timeout(Duration::from_secs(30)));

    let calls = vec![
        MethodCall::new("getPlatformVersion", json!(null)),
        MethodCall::new("getFrame", json!({ "filePath": input_path, "second": 1.5 })),
        MethodCall::new(
            "getFramesBytes",
            json!({
                "filePath": input_path,
                "seconds": [0.5, 1.0, -1.0],
                "width": 320,
                "mode": "batched",
            }),
        ),
        MethodCall::new(
            "getFramesToFiles",
            json!({ "filePath": input_path, "seconds": [0.5, 1.0], "cachePolicy": "use" }),
        ),
        MethodCall::new("getFrame", json!({ "second": 1.0 })),
        MethodCall::new("getVideoInfo", json!({})),
    ];

    let (sender, receiver) = unbounded();
    let total = calls.len();
    for call in calls {
        let method = call.method.clone();
        let sender = sender.clone();
        dispatcher.dispatch(call, move |response| {
            let _ = sender.send((method, response));
        });
    }

    for (method, response) in receiver.iter().take(total) {
        match response {
            MethodResponse::Success(MethodValue::Text(text)) => println!("{method}: {text}"),
            MethodResponse::Success(MethodValue::Bytes(bytes)) => {
                println!("{method}: {} bytes", bytes.len())
            }
            MethodResponse::Success(MethodValue::BytesList(frames)) => {
                let sizes: Vec<_> = frames
                    .iter()
                    .map(|frame| frame.as_ref().map(Vec::len))
                    .collect();
                println!("{method}: {sizes:?}");
            }
            MethodResponse::Success(MethodValue::PathList(paths)) => {
                println!("{method}: {paths:?}")
            }
            MethodResponse::Error(error) => println!("{method}: error {error}"),
            MethodResponse::NotImplemented => println!("{method}: not implemented"),
        }
    }
}
