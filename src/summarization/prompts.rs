/// Build the meeting-summary prompt.
///
/// The three-section structure is a contract with the model, not something
/// the pipeline parses: each section is explicitly "None" when it does not
/// apply, so downstream consumers always see all three headings.
pub fn build_summary_prompt(transcript: &str, meet_link: &str) -> String {
    format!(
        "As an expert meeting analyst, your task is to provide a clear and concise summary \
         of the following meeting transcript.\n\
         \n\
         Please structure your output in three distinct sections:\n\
         1. **Executive Summary:** A brief, high-level overview of the meeting's purpose \
         and key outcomes (2-3 sentences).\n\
         2. **Key Discussion Points:** A bulleted list of the most important topics, \
         decisions, and insights discussed.\n\
         3. **Action Items:** A numbered list of all tasks assigned, including who is \
         responsible and any mentioned deadlines.\n\
         \n\
         If any of these sections are not applicable (e.g., no action items were \
         discussed), state \"None.\"\n\
         \n\
         Meeting link: {meet_link}\n\
         \n\
         Here is the transcript:\n\
         ---\n\
         {transcript}\n\
         ---"
    )
}
