//! Instruction contract for model-generated replies

/// Sample phrases that show the model what a reply should look like
fn example_phrases(language_name: &str) -> Option<&'static str> {
    match language_name {
        "Japanese" => Some(r#"For example: "こんにちは！元気ですか？" or "今日は何をしましたか？""#),
        "Chinese (Traditional)" => Some(r#"For example: "你好！今天過得怎麼樣？" or "很高興認識你！""#),
        "English" => Some(r#"For example: "Hello! How are you doing today?" or "That sounds interesting!""#),
        _ => None,
    }
}

/// System instruction: reply only in `language_name`, one or two friendly sentences
pub fn system_instruction(language_name: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "CRITICAL INSTRUCTION: You MUST reply ONLY in {}.\n",
        language_name
    ));
    prompt.push_str(&format!(
        "Every single word of your response must be in {}.\n\n",
        language_name
    ));

    if let Some(examples) = example_phrases(language_name) {
        prompt.push_str(examples);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Rules:\n");
    prompt.push_str(&format!("1. ALWAYS respond in {} - no exceptions\n", language_name));
    prompt.push_str(&format!(
        "2. Even if the user writes in a different language, you MUST reply in {}\n",
        language_name
    ));
    prompt.push_str("3. Keep responses concise (1-2 sentences)\n");
    prompt.push_str("4. Be friendly and conversational\n");
    prompt.push_str(&format!("5. Do NOT mix languages - use ONLY {}\n\n", language_name));
    prompt.push_str(&format!(
        "You are a language practice partner helping someone learn {}.",
        language_name
    ));

    prompt
}

/// Wrap the user's utterance with a reminder of the reply language
pub fn user_prompt(utterance: &str, language_name: &str) -> String {
    format!(
        "[User message in another language, please respond in {} ONLY]: {}",
        language_name, utterance
    )
}
