//! `data_processor`: mock AutoML data engine.
//!
//! Dispatches on keywords in the task text. Dataset analysis picks the
//! problem type at random; pass a seed for reproducible runs.

use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::{SideEffect, Tool, ToolArgs};
use crate::error::ToolError;

pub const PROBLEM_TYPES: [&str; 4] = [
    "Regression",
    "Binary Classification",
    "Multi-Class Classification",
    "Clustering",
];

const TRAINING_REPORT: &str = "\
COMPREHENSIVE TRAINING SIMULATED: Initial metrics for all required algorithms have been computed in parallel.
--- REGRESSION RESULTS (RMSE, lower is better) ---
LinearRegression: 0.85 | Ridge: 0.83 | RandomForestRegressor: 0.45 | GradientBoostingRegressor: 0.36 | XGBoostRegressor: 0.31 | LSTM (Forecasting): 0.30
--- CLASSIFICATION RESULTS (AUC, higher is better) ---
LogisticRegression: 0.84 | SVC: 0.87 | RandomForestClassifier: 0.91 | LightGBMClassifier: 0.94 | XGBoostClassifier: 0.95
--- CLUSTERING RESULTS (Silhouette, higher is better) ---
KMeans: 0.58 | DBSCAN: 0.49 | AgglomerativeClustering: 0.55 | GaussianMixture: 0.52
--- DEEP LEARNING RESULTS ---
MLP (AUC): 0.92 | 1D-CNN (RMSE): 0.34 | Transformer (RMSE): 0.33
The Model Selector must now analyze these results based on the problem type identified earlier.";

pub struct DataProcessorTool {
    rng: Mutex<StdRng>,
}

impl DataProcessorTool {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn pick_problem_type(&self) -> &'static str {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        PROBLEM_TYPES.choose(&mut *rng).copied().unwrap_or(PROBLEM_TYPES[0])
    }

    fn process(&self, task: &str) -> String {
        let lowered = task.to_lowercase();
        if lowered.contains("download and analyze dataset") {
            let problem_type = self.pick_problem_type();
            format!(
                "SUCCESS: Dataset downloaded from mock client storage. \
                 Initial Data Analysis Complete: The problem type is identified as {}. \
                 Ready for Data Prep and Model Selection.",
                problem_type
            )
        } else if lowered.contains("clean and feature") {
            "Data preparation simulated: Missing values handled, outliers capped, categorical \
             features encoded, features engineered. Final dataset is ready for comprehensive modeling."
                .to_string()
        } else if lowered.contains("train all models") || lowered.contains("comprehensive training")
        {
            TRAINING_REPORT.to_string()
        } else {
            format!("General data processing task simulated for: {}", task.trim())
        }
    }
}

impl Default for DataProcessorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for DataProcessorTool {
    fn name(&self) -> &str {
        "data_processor"
    }

    fn description(&self) -> &str {
        "Mock data operations: download and analyze a dataset, clean and feature-engineer it, \
         or train all candidate models and report their metrics."
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::None
    }

    fn primary_arg(&self) -> &str {
        "task"
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let task = args.require("task")?;
        Ok(self.process(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(tool: &DataProcessorTool, task: &str) -> String {
        tool.invoke(&ToolArgs::new().with("task", task)).await.unwrap()
    }

    #[tokio::test]
    async fn test_keyword_dispatch() {
        let tool = DataProcessorTool::with_seed(7);
        let analysis = run(&tool, "Please DOWNLOAD AND ANALYZE DATASET for the client").await;
        assert!(analysis.starts_with("SUCCESS: Dataset downloaded"));
        assert!(PROBLEM_TYPES.iter().any(|p| analysis.contains(p)));

        let prep = run(&tool, "clean and feature the data").await;
        assert!(prep.starts_with("Data preparation simulated"));

        let training = run(&tool, "train all models").await;
        assert!(training.contains("XGBoostRegressor: 0.31"));
        assert!(training.contains("Silhouette"));

        let other = run(&tool, "summarize findings").await;
        assert_eq!(
            other,
            "General data processing task simulated for: summarize findings"
        );
    }

    #[tokio::test]
    async fn test_same_seed_same_problem_types() {
        let a = DataProcessorTool::with_seed(42);
        let b = DataProcessorTool::with_seed(42);
        for _ in 0..5 {
            assert_eq!(
                run(&a, "download and analyze dataset").await,
                run(&b, "download and analyze dataset").await
            );
        }
    }

    #[tokio::test]
    async fn test_missing_task_is_invalid() {
        let tool = DataProcessorTool::new();
        assert!(matches!(
            tool.invoke(&ToolArgs::new()).await,
            Err(ToolError::InvalidArgs(_))
        ));
    }
}
