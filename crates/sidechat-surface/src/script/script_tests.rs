use super::*;
use crate::registry::SubmissionMode;
use serde_json::json;

const TIMING: PollTiming = PollTiming::new(5000, 100);

fn generator() -> ScriptGenerator {
    ScriptGenerator::new(DEFAULT_MAX_SELECTOR_LEN)
}

/// Pull the ARGS object literal back out of a generated script.
fn args_of(script: &str) -> serde_json::Value {
    let start = script.find("const ARGS = ").unwrap() + "const ARGS = ".len();
    let end = start + script[start..].find(";\n").unwrap();
    serde_json::from_str(&script[start..end]).unwrap()
}

#[test]
fn test_validate_selector_accepts_attribute_selectors() {
    let sel = r#"button[data-testid="send-button"], div.ProseMirror[contenteditable='true']"#;
    assert_eq!(validate_selector(sel, 500), Ok(sel));
    assert_eq!(validate_selector("  #prompt-textarea ", 500), Ok("#prompt-textarea"));
}

#[test]
fn test_validate_selector_rejects_template_injection() {
    assert_eq!(
        validate_selector("div`); alert(1); (`", 500),
        Err(SelectorError::InvalidCharacters('`'))
    );
    assert_eq!(
        validate_selector("div${alert(1)}", 500),
        Err(SelectorError::InvalidCharacters('$'))
    );
    assert!(validate_selector("div\\", 500).is_err());
    assert_eq!(
        validate_selector("div`", 500).unwrap_err().code(),
        "selector_invalid_characters"
    );
    assert_eq!(validate_selector("   ", 500).unwrap_err().code(), "selector_empty");
    assert!(validate_selector("div\n", 500).is_ok());
    assert!(validate_selector("div\nspan", 500).is_err());
}

#[test]
fn test_validate_selector_limits() {
    assert_eq!(validate_selector("   ", 500), Err(SelectorError::Empty));
    let long = "a".repeat(11);
    assert_eq!(validate_selector(&long, 10), Err(SelectorError::TooLong { max: 10 }));
}

#[test]
fn test_unsafe_selector_never_reaches_a_script() {
    let generator = generator();
    let bad = "textarea${document.cookie}";
    assert!(generator.wait_for_element(bad, ElementAction::Focus, TIMING).is_err());
    assert!(generator.wait_for_enabled_button_and_click(bad, TIMING).is_err());
    assert!(generator.paste_trigger(bad, TIMING).is_err());
    let plan = TextSendPlan {
        input_selector: "textarea",
        submit_selector: "button`",
        ready_selector: None,
        mode: SubmissionMode::Click,
        text: "hi",
        auto_submit: true,
        input_timing: TIMING,
        submit_timing: TIMING,
    };
    assert_eq!(
        generator.send_text(&plan),
        Err(ScriptError::Selector(SelectorError::InvalidCharacters('`')))
    );
}

#[test]
fn test_wait_for_element_write_embeds_text_as_json() {
    let text = "line one\n\"quoted\" `tick` ${x} </script>";
    let script = generator()
        .wait_for_element("#prompt-textarea", ElementAction::Write(text), TIMING)
        .unwrap();
    assert!(script.starts_with("(async () => {"));
    assert!(script.ends_with("})()"));
    let args = args_of(&script);
    assert_eq!(args["text"], json!(text));
    assert_eq!(args["selector"], json!("#prompt-textarea"));
    assert_eq!(args["waitMs"], json!(5000));
    assert_eq!(args["intervalMs"], json!(100));
}

#[test]
fn test_wait_for_element_focus_has_null_text() {
    let script = generator()
        .wait_for_element("textarea", ElementAction::Focus, TIMING)
        .unwrap();
    assert_eq!(args_of(&script)["text"], serde_json::Value::Null);
    assert!(script.contains("input_not_found"));
}

#[test]
fn test_click_script_checks_every_disabled_signal() {
    let script = generator()
        .wait_for_enabled_button_and_click("button.send", PollTiming::new(8000, 200))
        .unwrap();
    assert!(script.contains("el.disabled"));
    assert!(script.contains("aria-disabled"));
    assert!(script.contains("classList.contains('disabled')"));
    assert!(script.contains("hasAttribute('disabled')"));
    assert!(script.contains("reason: 'timeout'"));
    assert_eq!(args_of(&script)["waitMs"], json!(8000));
}

#[test]
fn test_paste_trigger_reads_from_the_clipboard() {
    let script = generator().paste_trigger("textarea", TIMING).unwrap();
    let args = args_of(&script);
    assert_eq!(args["selector"], json!("textarea"));
    assert!(args.get("image").is_none());
    assert!(script.contains("execCommand('paste')"));
    assert!(script.contains("navigator.clipboard.read()"));
    assert!(!script.contains("atob"));
    assert!(!script.contains("data:image"));
}

#[test]
fn test_send_text_plan_arguments() {
    let plan = TextSendPlan {
        input_selector: "#prompt-textarea",
        submit_selector: r#"button[data-testid="send-button"]"#,
        ready_selector: Some("main"),
        mode: SubmissionMode::EnterKey,
        text: "hello",
        auto_submit: true,
        input_timing: TIMING,
        submit_timing: PollTiming::new(8000, 200),
    };
    let args = args_of(&generator().send_text(&plan).unwrap());
    assert_eq!(args["mode"], json!("enterKey"));
    assert_eq!(args["autoSubmit"], json!(true));
    assert_eq!(args["readySelector"], json!("main"));
    assert_eq!(args["submitSelector"], json!(r#"button[data-testid="send-button"]"#));
    assert_eq!(args["submitWaitMs"], json!(8000));
}

#[test]
fn test_picker_scripts() {
    let generator = generator();
    assert_eq!(generator.picker_install("abc'); x('"), Err(ScriptError::InvalidToken));
    let script = generator.picker_install("0b6c5d1e-aaaa-bbbb-cccc-123456789abc").unwrap();
    let args = args_of(&script);
    assert_eq!(args["prefix"], json!(PICKER_REPORT_PREFIX));
    assert!(script.contains("window.__sidechatPicker"));

    let remove = generator.picker_remove();
    assert!(remove.contains("teardown"));
    assert!(remove.contains("data-sidechat-picker"));
}

#[test]
fn test_is_image_data_url() {
    assert!(is_image_data_url("data:image/jpeg;base64,/9j/4AAQSkZJRg=="));
    assert!(!is_image_data_url("data:text/html;base64,PGgxPg=="));
    assert!(!is_image_data_url("data:image/png;base64,"));
    assert!(!is_image_data_url("data:image/png;base64,abc\"+alert(1)+\""));
}

#[test]
fn test_script_report_decoding() {
    let report = ScriptReport::from_value(&json!({"success": false, "reason": "timeout"})).unwrap();
    assert!(!report.success);
    assert_eq!(report.reason(), "timeout");

    let report = ScriptReport::from_value(&json!({"success": true, "waitedMs": 300})).unwrap();
    assert_eq!(report.waited_ms, Some(300));

    assert!(ScriptReport::from_value(&json!("done")).is_none());
}
