use anyhow::Result;

use {
    indus_agent::{AgentSettings, DecisionServiceClient},
    indus_config::IndusConfig,
};

pub async fn handle_plan(config: &IndusConfig, prompt: &str) -> Result<()> {
    let settings = AgentSettings::from(config);
    let client = DecisionServiceClient::new(&settings)?;
    let plan = client.plan(prompt).await?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
