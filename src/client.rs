use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::answers::WeeklyAnswers;
use crate::config::Settings;
use crate::error::{error_detail, ApiError};
use crate::models::{
    AnswersPayload, GoogleLoginRequest, HumilityRequest, HumilityScore, LoginRequest,
    LoginResponse, MessageResponse, MonthlyResult, NewEmailUser, NewGoogleUser, ProfileUpdate,
    Questionnaire, SkillAdvice, SkillAdviceRequest, SkillScores, Student, TalentResult,
    TalentResultCreate, User, UserUpdate,
};

/// REST client for the skills backend. Every request carries the bearer
/// token when one is set.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = check(builder.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(self.request(Method::GET, path)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post("/auth/login", &body).await
    }

    pub async fn google_login(&self, credential: &str) -> Result<LoginResponse, ApiError> {
        let body = GoogleLoginRequest {
            credential: credential.to_string(),
        };
        self.post("/auth/google", &body).await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        check(self.request(Method::POST, "/auth/logout").send().await?).await?;
        Ok(())
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.get("/auth/me").await
    }

    pub async fn users(&self) -> Result<Vec<User>, ApiError> {
        self.get("/admin/users").await
    }

    pub async fn user(&self, user_id: &str) -> Result<User, ApiError> {
        self.get(&format!("/admin/users/{user_id}")).await
    }

    pub async fn create_email_user(&self, user: &NewEmailUser) -> Result<User, ApiError> {
        self.post("/admin/users/email", user).await
    }

    pub async fn create_google_user(&self, user: &NewGoogleUser) -> Result<User, ApiError> {
        self.post("/admin/users/google", user).await
    }

    pub async fn update_user(&self, user_id: &str, update: &UserUpdate) -> Result<User, ApiError> {
        self.put(&format!("/admin/users/{user_id}"), update).await
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<String, ApiError> {
        let response: MessageResponse = self
            .send(self.request(Method::DELETE, &format!("/admin/users/{user_id}")))
            .await?;
        Ok(response.message)
    }

    pub async fn questionnaires(&self) -> Result<Vec<Questionnaire>, ApiError> {
        self.get("/questionnaires").await
    }

    pub async fn questionnaire(&self, id: &str) -> Result<Questionnaire, ApiError> {
        self.get(&format!("/questionnaires/{id}")).await
    }

    pub async fn submit_questionnaire(
        &self,
        id: &str,
        answers: &WeeklyAnswers,
    ) -> Result<Questionnaire, ApiError> {
        self.post(&format!("/questionnaires/{id}/submit"), &AnswersPayload { answers })
            .await
    }

    pub async fn update_questionnaire(
        &self,
        id: &str,
        answers: &WeeklyAnswers,
    ) -> Result<Questionnaire, ApiError> {
        self.put(&format!("/questionnaires/{id}"), &AnswersPayload { answers })
            .await
    }

    pub async fn monthly_results(&self) -> Result<Vec<MonthlyResult>, ApiError> {
        self.get("/monthly-results").await
    }

    pub async fn monthly_result(&self, id: &str) -> Result<MonthlyResult, ApiError> {
        self.get(&format!("/monthly-results/{id}")).await
    }

    pub async fn finalize_month(
        &self,
        year: i32,
        month: u32,
        humility_score: u32,
    ) -> Result<MonthlyResult, ApiError> {
        let builder = self.request(Method::POST, "/monthly-results/finalize").query(&[
            ("year", year.to_string()),
            ("month", month.to_string()),
            ("humility_score", humility_score.to_string()),
        ]);
        self.send(builder).await
    }

    pub async fn talent_result(&self) -> Result<Option<TalentResult>, ApiError> {
        self.get("/talent-result").await
    }

    pub async fn save_talent_result(
        &self,
        result: &TalentResultCreate,
    ) -> Result<TalentResult, ApiError> {
        self.post("/talent-result", result).await
    }

    pub async fn students(&self) -> Result<Vec<Student>, ApiError> {
        self.get("/students").await
    }

    pub async fn evaluate_humility(
        &self,
        request: &HumilityRequest,
    ) -> Result<HumilityScore, ApiError> {
        self.post("/evaluate-humility", request).await
    }

    pub async fn skill_advice(&self, skills: &SkillScores) -> Result<String, ApiError> {
        let advice: SkillAdvice = self
            .post("/generate-skill-advice", &SkillAdviceRequest { skills })
            .await?;
        Ok(advice.advice)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        self.put("/profile", update).await
    }
}

async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = error_detail(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_string()
    });

    Err(match status.as_u16() {
        401 => ApiError::Unauthorized(detail),
        403 => ApiError::Forbidden(detail),
        code => ApiError::Backend {
            status: code,
            detail,
        },
    })
}

#[cfg(test)]
pub(crate) fn test_client(base_url: &str) -> ApiClient {
    let settings = Settings {
        api_url: base_url.to_string(),
        database_url: "sqlite::memory:".to_string(),
        timeout: None,
    };
    ApiClient::new(&settings).expect("client")
}
