use std::io::Read;

use anyhow::Context;

use crate::client::ApiClient;
use crate::error::ValidationError;
use crate::models::{NewEmailUser, NewGoogleUser, Role, User, UserUpdate};

pub const CLASS_OPTIONS: [&str; 12] = [
    "1-A", "1-B", "1-C", "1-D", "2-A", "2-B", "2-C", "2-D", "3-A", "3-B", "3-C", "3-D",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub class_name: Option<String>,
    pub password: Option<String>,
    /// Account signs in with Google and has no password.
    pub google: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NewAccount {
    Email(NewEmailUser),
    Google(NewGoogleUser),
}

impl NewAccount {
    pub fn email(&self) -> &str {
        match self {
            NewAccount::Email(user) => &user.email,
            NewAccount::Google(user) => &user.email,
        }
    }
}

fn check_class(role: Role, class_name: Option<&str>) -> Result<Option<String>, ValidationError> {
    if role != Role::Student {
        return Ok(None);
    }
    let class_name = class_name
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ValidationError::Required("class (students only)"))?;
    if !CLASS_OPTIONS.contains(&class_name) {
        return Err(ValidationError::not_allowed("class", &CLASS_OPTIONS));
    }
    Ok(Some(class_name.to_string()))
}

impl NewUser {
    /// Validates the form and picks the request shape for its auth type.
    pub fn into_account(self) -> Result<NewAccount, ValidationError> {
        let email = self.email.trim().to_string();
        let name = self.name.trim().to_string();
        if email.is_empty() {
            return Err(ValidationError::Required("email"));
        }
        if name.is_empty() {
            return Err(ValidationError::Required("name"));
        }

        let class_name = check_class(self.role, self.class_name.as_deref())?;

        if self.google {
            return Ok(NewAccount::Google(NewGoogleUser {
                email,
                name,
                role: self.role,
                class_name,
            }));
        }

        let password = self
            .password
            .filter(|value| !value.is_empty())
            .ok_or(ValidationError::Required("password"))?;
        Ok(NewAccount::Email(NewEmailUser {
            email,
            password,
            name,
            role: self.role,
            class_name,
        }))
    }
}

pub fn build_user_update(
    current: &User,
    name: Option<String>,
    role: Option<Role>,
    class_name: Option<String>,
    is_active: Option<bool>,
) -> Result<UserUpdate, ValidationError> {
    if let Some(name) = &name {
        if name.trim().is_empty() {
            return Err(ValidationError::Required("name"));
        }
    }

    let effective_role = role.unwrap_or(current.role);
    let class_name = if role.is_some() || class_name.is_some() {
        let class_name = class_name.or_else(|| current.class_name.clone());
        check_class(effective_role, class_name.as_deref())?
    } else {
        None
    };

    let update = UserUpdate {
        name: name.map(|value| value.trim().to_string()),
        role,
        class_name,
        is_active,
    };
    if update.is_empty() {
        return Err(ValidationError::Rule("nothing to update".to_string()));
    }
    Ok(update)
}

/// Reads `email,name,role,class_name,password` rows. A blank password
/// makes a Google account.
pub fn read_import<R: Read>(input: R) -> anyhow::Result<Vec<NewUser>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        email: String,
        name: String,
        role: String,
        #[serde(default)]
        class_name: Option<String>,
        #[serde(default)]
        password: Option<String>,
    }

    let mut reader = csv::Reader::from_reader(input);
    let mut users = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("invalid CSV row on line {line}"))?;
        let role: Role = row
            .role
            .parse()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("invalid role on line {line}"))?;
        let password = row.password.filter(|value| !value.trim().is_empty());
        users.push(NewUser {
            email: row.email,
            name: row.name,
            role,
            class_name: row.class_name.filter(|value| !value.trim().is_empty()),
            google: password.is_none(),
            password,
        });
    }

    Ok(users)
}

#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub created: Vec<User>,
    pub failed: Vec<(String, String)>,
}

pub async fn create_account(client: &ApiClient, account: &NewAccount) -> anyhow::Result<User> {
    let user = match account {
        NewAccount::Email(user) => client.create_email_user(user).await?,
        NewAccount::Google(user) => client.create_google_user(user).await?,
    };
    Ok(user)
}

/// Creates every row, carrying on past failures.
pub async fn import_users(client: &ApiClient, users: Vec<NewUser>) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();

    for user in users {
        let email = user.email.clone();
        let account = match user.into_account() {
            Ok(account) => account,
            Err(err) => {
                outcome.failed.push((email, err.to_string()));
                continue;
            }
        };
        match create_account(client, &account).await {
            Ok(created) => outcome.created.push(created),
            Err(err) => {
                log::warn!("import of {} failed: {err:#}", account.email());
                outcome.failed.push((email, format!("{err:#}")));
            }
        }
    }

    outcome
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserSummary {
    pub total: usize,
    pub students: usize,
    pub teachers: usize,
    pub admins: usize,
    pub active: usize,
    pub inactive: usize,
}

pub fn summarize(users: &[User]) -> UserSummary {
    let mut summary = UserSummary {
        total: users.len(),
        ..UserSummary::default()
    };
    for user in users {
        match user.role {
            Role::Student => summary.students += 1,
            Role::Teacher => summary.teachers += 1,
            Role::Admin => summary.admins += 1,
        }
        if user.is_active {
            summary.active += 1;
        } else {
            summary.inactive += 1;
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_client;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn form(role: Role, class_name: Option<&str>, password: Option<&str>, google: bool) -> NewUser {
        NewUser {
            email: "jules@example.com".to_string(),
            name: "Jules".to_string(),
            role,
            class_name: class_name.map(str::to_string),
            password: password.map(str::to_string),
            google,
        }
    }

    fn user(role: Role, is_active: bool) -> User {
        User {
            id: "u".to_string(),
            email: "u@example.com".to_string(),
            name: String::new(),
            role,
            is_active,
            profile_image: None,
            hobbies: None,
            current_focus: None,
            class_name: None,
        }
    }

    #[test]
    fn students_need_a_listed_class() {
        let missing = form(Role::Student, None, Some("pw"), false);
        assert!(missing.into_account().is_err());

        let unknown = form(Role::Student, Some("4-A"), Some("pw"), false);
        assert!(matches!(
            unknown.into_account(),
            Err(ValidationError::NotAllowed { field: "class", .. })
        ));

        let ok = form(Role::Student, Some("2-B"), Some("pw"), false);
        assert!(matches!(ok.into_account(), Ok(NewAccount::Email(_))));
    }

    #[test]
    fn class_is_dropped_for_staff() {
        let account = form(Role::Teacher, Some("1-A"), None, true).into_account().unwrap();
        match account {
            NewAccount::Google(user) => assert_eq!(user.class_name, None),
            other => panic!("unexpected account {other:?}"),
        }
    }

    #[test]
    fn email_accounts_need_a_password() {
        let account = form(Role::Admin, None, Some(""), false).into_account();
        assert_eq!(account, Err(ValidationError::Required("password")));
    }

    #[test]
    fn csv_rows_pick_auth_type_from_password() {
        let data = "email,name,role,class_name,password\n\
                    kiara@example.com,Kiara,student,1-C,secret\n\
                    avery@example.com,Avery,teacher,,\n";
        let users = read_import(data.as_bytes()).unwrap();
        assert_eq!(users.len(), 2);
        assert!(!users[0].google);
        assert_eq!(users[0].class_name.as_deref(), Some("1-C"));
        assert!(users[1].google);
        assert_eq!(users[1].role, Role::Teacher);
    }

    #[test]
    fn csv_with_bad_role_reports_line() {
        let data = "email,name,role,class_name,password\nx@example.com,X,janitor,,\n";
        let err = read_import(data.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn role_change_to_student_requires_class() {
        let teacher = user(Role::Teacher, true);
        assert!(build_user_update(&teacher, None, Some(Role::Student), None, None).is_err());
        let update =
            build_user_update(&teacher, None, Some(Role::Student), Some("3-D".to_string()), None)
                .unwrap();
        assert_eq!(update.class_name.as_deref(), Some("3-D"));
        assert!(build_user_update(&teacher, None, None, None, None).is_err());
    }

    #[test]
    fn summary_counts_roles_and_activity() {
        let users = vec![
            user(Role::Student, true),
            user(Role::Student, false),
            user(Role::Teacher, true),
            user(Role::Admin, true),
        ];
        let summary = summarize(&users);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.students, 2);
        assert_eq!((summary.active, summary.inactive), (3, 1));
    }

    #[tokio::test]
    async fn import_continues_after_a_failed_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/users/google"))
            .and(body_json(json!({
                "email": "avery@example.com", "name": "Avery", "role": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u-2", "email": "avery@example.com", "name": "Avery", "role": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let users = vec![
            form(Role::Student, None, Some("pw"), false),
            NewUser {
                email: "avery@example.com".to_string(),
                name: "Avery".to_string(),
                role: Role::Teacher,
                class_name: None,
                password: None,
                google: true,
            },
        ];
        let outcome = import_users(&test_client(&server.uri()), users).await;
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, "jules@example.com");
    }
}
