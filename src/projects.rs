use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::Student;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResource {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteratureResource {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub publish_date: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyKind {
    #[default]
    Survey,
    Hearing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyResource {
    pub kind: SurveyKind,
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Web,
    Literature,
    Survey,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Web => "web",
            ResourceKind::Literature => "literature",
            ResourceKind::Survey => "survey",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "web" => Some(ResourceKind::Web),
            "literature" => Some(ResourceKind::Literature),
            "survey" => Some(ResourceKind::Survey),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Web(WebResource),
    Literature(LiteratureResource),
    Survey(SurveyResource),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Web(_) => ResourceKind::Web,
            Resource::Literature(_) => ResourceKind::Literature,
            Resource::Survey(_) => ResourceKind::Survey,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Resource::Web(resource) => &resource.title,
            Resource::Literature(resource) => &resource.title,
            Resource::Survey(resource) => &resource.title,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Resource::Web(resource) => {
                if resource.url.trim().is_empty() {
                    return Err(ValidationError::Required("url"));
                }
                if resource.title.trim().is_empty() {
                    return Err(ValidationError::Required("title"));
                }
            }
            Resource::Literature(resource) => {
                if resource.title.trim().is_empty() {
                    return Err(ValidationError::Required("title"));
                }
            }
            Resource::Survey(resource) => {
                if resource.title.trim().is_empty() {
                    return Err(ValidationError::Required("title"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResource {
    pub id: Uuid,
    pub resource: Resource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDetails {
    pub name: Option<String>,
    pub theme: Option<String>,
    pub background: Option<String>,
    pub hypothesis: Option<String>,
    pub presentation_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub theme: String,
    pub background: String,
    pub hypothesis: String,
    pub presentation_url: String,
    pub team_members: Vec<TeamMember>,
    pub resources: Vec<StoredResource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(user_id: &str, name: &str, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::Required("project name"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: name.trim().to_string(),
            theme: String::new(),
            background: String::new(),
            hypothesis: String::new(),
            presentation_url: String::new(),
            team_members: Vec::new(),
            resources: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, details: ProjectDetails, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if let Some(name) = details.name {
            if name.trim().is_empty() {
                return Err(ValidationError::Required("project name"));
            }
            self.name = name.trim().to_string();
        }
        if let Some(theme) = details.theme {
            self.theme = theme;
        }
        if let Some(background) = details.background {
            self.background = background;
        }
        if let Some(hypothesis) = details.hypothesis {
            self.hypothesis = hypothesis;
        }
        if let Some(url) = details.presentation_url {
            self.presentation_url = url;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn add_member(&mut self, student: &Student, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if self.team_members.iter().any(|member| member.id == student.id) {
            return Err(ValidationError::Rule(format!(
                "{} is already a team member",
                student.name
            )));
        }
        self.team_members.push(TeamMember {
            id: student.id.clone(),
            name: student.name.clone(),
        });
        self.updated_at = now;
        Ok(())
    }

    pub fn remove_member(&mut self, member_id: &str, now: DateTime<Utc>) -> bool {
        let before = self.team_members.len();
        self.team_members.retain(|member| member.id != member_id);
        let removed = self.team_members.len() != before;
        if removed {
            self.updated_at = now;
        }
        removed
    }

    pub fn add_resource(&mut self, resource: Resource, now: DateTime<Utc>) -> Result<Uuid, ValidationError> {
        resource.validate()?;
        let id = Uuid::new_v4();
        self.resources.push(StoredResource { id, resource });
        self.updated_at = now;
        Ok(id)
    }

    pub fn remove_resource(&mut self, resource_id: Uuid, now: DateTime<Utc>) -> bool {
        let before = self.resources.len();
        self.resources.retain(|stored| stored.id != resource_id);
        let removed = self.resources.len() != before;
        if removed {
            self.updated_at = now;
        }
        removed
    }

    pub fn resources_of(&self, kind: ResourceKind) -> impl Iterator<Item = &StoredResource> {
        self.resources
            .iter()
            .filter(move |stored| stored.resource.kind() == kind)
    }
}

/// Case-insensitive match on name or email, as the member picker does.
pub fn filter_students<'a>(students: &'a [Student], query: &str) -> Vec<&'a Student> {
    let needle = query.trim().to_lowercase();
    students
        .iter()
        .filter(|student| {
            needle.is_empty()
                || student.name.to_lowercase().contains(&needle)
                || student.email.to_lowercase().contains(&needle)
        })
        .collect()
}
