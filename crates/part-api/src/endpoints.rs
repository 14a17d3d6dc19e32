//! Endpoint bindings for the PART API.
//!
//! Each method is a fixed path and verb. Some return the whole [`Envelope`],
//! others only its `data`; the split follows the server contract per
//! operation and callers depend on it, so it is intentionally not uniform.

use crate::client::PartClient;
use crate::error::{PartApiError, Result};
use crate::types::{
    Envelope, EvaluationRequest, IdRequest, ProgressCallback, ResourceId, SurveyIdRequest,
    SurveyResponseRequest, UploadFile,
};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

/// The data-type probe only sends this many leading bytes of the file.
pub const DATA_TYPE_SAMPLE_BYTES: usize = 10 * 1024;

impl PartClient {
    // ---------- Questions ----------

    /// All questions (`data`).
    pub async fn get_questions(&self) -> Result<Value> {
        Ok(self.get("/getQuestions").await?.into_data())
    }

    pub async fn create_question<Q: Serialize + ?Sized>(&self, question: &Q) -> Result<Envelope> {
        self.send_json(Method::POST, "/createQuestion", question).await
    }

    pub async fn edit_question<Q: Serialize + ?Sized>(&self, question: &Q) -> Result<Envelope> {
        self.send_json(Method::POST, "/editQuestion", question).await
    }

    pub async fn delete_question(&self, id: impl Into<ResourceId>) -> Result<Envelope> {
        let id = id.into();
        self.send_json(Method::POST, "/deleteQuestion", &IdRequest { id: &id })
            .await
    }

    pub async fn get_question_by_id(&self, id: impl Into<ResourceId>) -> Result<Envelope> {
        let id = id.into();
        self.send_json(Method::POST, "/getQuestionById", &IdRequest { id: &id })
            .await
    }

    /// Supported question kinds (`data`).
    pub async fn get_question_types(&self) -> Result<Value> {
        Ok(self.get("/questionTypes").await?.into_data())
    }

    // ---------- Surveys ----------

    /// All surveys (`data`).
    pub async fn get_surveys(&self) -> Result<Value> {
        Ok(self.get("/getSurveys").await?.into_data())
    }

    pub async fn create_survey<S: Serialize + ?Sized>(&self, survey: &S) -> Result<Envelope> {
        self.send_json(Method::POST, "/createSurvey", survey).await
    }

    pub async fn edit_survey<S: Serialize + ?Sized>(&self, survey: &S) -> Result<Envelope> {
        self.send_json(Method::POST, "/editSurvey", survey).await
    }

    /// One survey (`data`).
    pub async fn get_survey_by_id(&self, id: impl Into<ResourceId>) -> Result<Value> {
        let id = id.into();
        let envelope = self
            .send_json(Method::POST, "/getSurveyById", &IdRequest { id: &id })
            .await?;
        Ok(envelope.into_data())
    }

    pub async fn delete_survey(&self, id: impl Into<ResourceId>) -> Result<Envelope> {
        let id: ResourceId = id.into();
        self.get(&with_query("/deleteSurvey", "id", &id.to_string()))
            .await
    }

    pub async fn set_active_survey(&self, survey_id: impl Into<ResourceId>) -> Result<Envelope> {
        let survey_id = survey_id.into();
        self.send_json(
            Method::POST,
            "/setActiveSurvey",
            &SurveyIdRequest {
                survey_id: &survey_id,
            },
        )
        .await
    }

    pub async fn set_inactive_survey(&self, survey_id: impl Into<ResourceId>) -> Result<Envelope> {
        let survey_id = survey_id.into();
        self.send_json(
            Method::POST,
            "/setInactiveSurvey",
            &SurveyIdRequest {
                survey_id: &survey_id,
            },
        )
        .await
    }

    pub async fn get_active_survey(&self) -> Result<Envelope> {
        self.get("/getActiveSurvey").await
    }

    // ---------- Responses ----------

    /// Submit answers for a survey.
    pub async fn post_response<R: Serialize>(
        &self,
        survey_id: impl Into<ResourceId>,
        response: &R,
    ) -> Result<Envelope> {
        let survey_id = survey_id.into();
        self.send_json(
            Method::POST,
            "/postResponse",
            &SurveyResponseRequest {
                survey_id: &survey_id,
                response,
            },
        )
        .await
    }

    /// All submitted responses (`data`).
    pub async fn get_responses(&self) -> Result<Value> {
        Ok(self.get("/getResponses").await?.into_data())
    }

    /// One response (`data`).
    pub async fn get_response_by_id(&self, id: impl Into<ResourceId>) -> Result<Value> {
        let id: ResourceId = id.into();
        let path = with_query("/getResponse", "id", &id.to_string());
        Ok(self.get(&path).await?.into_data())
    }

    // ---------- Session ----------

    /// End the server-side session. The local session state is left as is;
    /// the next 401 will flip it.
    pub async fn logout(&self) -> Result<Envelope> {
        self.get("/logout").await
    }

    // ---------- Data files ----------

    /// Ask the server to infer column types from the first
    /// [`DATA_TYPE_SAMPLE_BYTES`] of `file`.
    pub async fn get_data_types(
        &self,
        file: &UploadFile,
        progress: Option<ProgressCallback>,
    ) -> Result<Envelope> {
        self.upload("/dataType", file.truncated(DATA_TYPE_SAMPLE_BYTES), progress)
            .await
    }

    pub async fn upload_data_file(
        &self,
        file: UploadFile,
        progress: Option<ProgressCallback>,
    ) -> Result<Envelope> {
        self.upload("/dataFileUpload", file, progress).await
    }

    /// Available evaluation strategies (`data`).
    pub async fn get_data_evaluation_strategies(&self) -> Result<Value> {
        Ok(self.get("/dataEvaluationStrategies").await?.into_data())
    }

    // ---------- Metrics ----------

    /// All metrics (`data`).
    pub async fn get_metrics(&self) -> Result<Value> {
        Ok(self.get("/metrics").await?.into_data())
    }

    pub async fn create_metric(&self, metric_name: &str) -> Result<Envelope> {
        let path = metric_path(metric_name)?;
        self.request(Method::PUT, &path, &[], None).await
    }

    pub async fn delete_metric(&self, metric_name: &str) -> Result<Envelope> {
        let path = metric_path(metric_name)?;
        self.request(Method::DELETE, &path, &[], None).await
    }

    // ---------- Evaluations ----------

    /// All evaluations (`data`).
    pub async fn get_evaluations(&self) -> Result<Value> {
        Ok(self.get("/getEvaluations").await?.into_data())
    }

    /// Evaluation metadata (`data`).
    pub async fn get_evaluation_metadata(&self) -> Result<Value> {
        Ok(self.get("/evaluationMetadata").await?.into_data())
    }

    /// One evaluation (`data`).
    pub async fn get_evaluation_by_id(&self, id: impl Into<ResourceId>) -> Result<Value> {
        let id: ResourceId = id.into();
        let path = with_query("/evaluationById", "id", &id.to_string());
        Ok(self.get(&path).await?.into_data())
    }

    pub async fn create_evaluation<E: Serialize>(&self, evaluation: &E) -> Result<Envelope> {
        self.send_json(
            Method::POST,
            "/createEvaluation",
            &EvaluationRequest {
                evaluation_data: evaluation,
            },
        )
        .await
    }

    pub async fn edit_evaluation<E: Serialize>(&self, evaluation: &E) -> Result<Envelope> {
        self.send_json(
            Method::POST,
            "/editEvaluation",
            &EvaluationRequest {
                evaluation_data: evaluation,
            },
        )
        .await
    }

    /// Delete an evaluation; returns `data`.
    pub async fn delete_evaluation(&self, id: impl Into<ResourceId>) -> Result<Value> {
        let id = id.into();
        let envelope = self
            .send_json(Method::POST, "/deleteEvaluation", &IdRequest { id: &id })
            .await?;
        Ok(envelope.into_data())
    }
}

fn with_query(path: &str, key: &str, value: &str) -> String {
    format!("{path}?{key}={}", urlencoding::encode(value))
}

fn metric_path(metric_name: &str) -> Result<String> {
    if metric_name.trim().is_empty() {
        return Err(PartApiError::Input("metric name must not be empty".to_string()));
    }
    Ok(with_query("/metrics", "metricName", metric_name))
}
