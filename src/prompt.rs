//! Prompt sent to Gemini alongside the user's activity description.

/// Section headings the model is asked to write, in order.
pub const SECTION_LABELS: [&str; 7] = [
    "主題說明",
    "心得反思",
    "學習歷程檔案內容簡介（100 字內）",
    "檢討或反思",
    "學習或執行過程（步驟、結果）",
    "對未來的影響",
    "學習成果佐證說明",
];

const NUMERALS: [&str; 7] = ["一", "二", "三", "四", "五", "六", "七"];

/// Builds the fixed seven-section prompt around `user_input`.
///
/// The input is appended verbatim after the lead-in line, followed by a
/// single trailing newline.
pub fn format_prompt(user_input: &str) -> String {
    let mut prompt = String::from("請使用繁體中文，根據以下活動資訊，撰寫以下七個段落，請加上標題：\n\n");

    for (numeral, label) in NUMERALS.iter().zip(SECTION_LABELS.iter()) {
        prompt.push_str(&format!("{}、 {}  \n", numeral, label));
    }

    prompt.push_str("\n活動資訊如下：\n");
    prompt.push_str(user_input);
    prompt.push('\n');
    prompt
}
