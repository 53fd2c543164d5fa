//! Prompt templates for the researcher and writer stages.

/// Researcher prompt: turn raw lookup output into structured notes.
pub fn research_prompt(topic: &str, lookup: &str) -> String {
    format!(
        "You are a Lead Researcher. Analyze the following request: {topic}

Here is the available research data gathered from external sources:
{lookup}

Based on this information, produce well-structured research notes that include:
1. Key Facts - the most important factual points about the topic.
2. Important Statistics - quantitative data, figures, market sizes, growth rates.
3. Current Trends - what is happening right now in this space.
4. Key Insights - deeper observations or expert opinions.
5. Potential Article Angles - 2-3 compelling directions for the final article.

Do NOT write the article itself. Only provide organised research notes.
Be comprehensive, accurate, and specific."
    )
}

/// Writer prompt for the first draft.
pub fn initial_draft_prompt(topic: &str, notes: &str) -> String {
    format!(
        "You are a Senior Editor. Write a comprehensive blog post based on the research notes below.

Topic: {topic}

Research Notes:
{notes}

Write a well-structured, engaging blog post that:
1. Opens with a compelling introduction that hooks the reader.
2. Covers all key aspects from the research with clear headings.
3. Incorporates relevant statistics and facts naturally.
4. Includes practical takeaways or insights for the reader.
5. Closes with a strong conclusion summarising the key points.

Format the output in Markdown. Aim for ~600-900 words."
    )
}

/// Writer prompt for a revision requested by the reviewer.
pub fn revision_prompt(topic: &str, notes: &str, draft: &str, feedback: &str) -> String {
    format!(
        "You are a Senior Editor. You have received feedback on your draft and must revise it.

Topic: {topic}

Research Notes:
{notes}

Previous Draft:
{draft}

Human Feedback: {feedback}

Please revise the draft to fully address the feedback provided.
Maintain a professional, engaging tone and keep the article well-structured.
Format the output in Markdown with proper headings and sections."
    )
}
