use super::{ResearchError, ResearchSource};
use async_trait::async_trait;
use tracing::warn;

/// Last-resort source returning canned, clearly-marked placeholder material.
///
/// Keeps the workflow usable without any search credentials or network.
pub struct PlaceholderSource;

pub fn placeholder_research(topic: &str) -> String {
    format!(
        "Placeholder research data for '{topic}':

Key Facts:
- {topic} is a significant topic with wide-ranging implications across multiple industries.
- Experts have identified it as one of the most discussed subjects in recent years.
- Its history goes back several decades, with strong acceleration recently.

Statistics:
- Global market size: estimated $50-100 billion, growing at roughly 15% CAGR.
- Adoption rate: 40% year-over-year increase across major sectors.
- Investment in this area reached record highs in the past two years.

Current Trends:
1. Digital transformation is accelerating the pace of change.
2. Sustainability and ethical considerations are reshaping strategies.
3. AI and automation are creating new opportunities and challenges.
4. Regulatory frameworks are evolving to keep pace with innovation.

Key Stakeholders:
- Businesses and startups driving innovation.
- Government bodies setting policy and regulation.
- Consumers whose behaviors are shifting rapidly.
- Researchers and academics providing evidence-based insights.

Potential Content Angles:
- Historical evolution and where we are today.
- Benefits and challenges for different stakeholders.
- Future outlook for the next 5-10 years.
- Practical takeaways for everyday readers.

NOTE: This is placeholder data. Configure a Tavily API key or enable
DuckDuckGo lookups to get real search results."
    )
}

#[async_trait]
impl ResearchSource for PlaceholderSource {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn lookup(&self, query: &str) -> Result<String, ResearchError> {
        warn!(query = %query, "Using placeholder research data");
        Ok(placeholder_research(query))
    }
}
