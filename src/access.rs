use std::fmt;

use crate::models::Role;

pub const NO_ACCESS: &str = "アクセス権限がありません";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    StudentHome,
    TeacherHome,
    AdminHome,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/auth/login",
            Route::StudentHome => "/student/home",
            Route::TeacherHome => "/teacher/home",
            Route::AdminHome => "/admin/home",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

pub fn home_for(role: Role) -> Route {
    match role {
        Role::Student => Route::StudentHome,
        Role::Teacher => Route::TeacherHome,
        Role::Admin => Route::AdminHome,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Student,
    Teacher,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Allow,
    Redirect(Route),
    Deny,
}

/// Decides what a signed-in user sees when opening a page in `area`.
pub fn gate(area: Area, role: Role) -> Gate {
    match (area, role) {
        (Area::Student, Role::Student) => Gate::Allow,
        (Area::Student, Role::Teacher) => Gate::Redirect(Route::TeacherHome),
        (Area::Student, Role::Admin) => Gate::Deny,
        (Area::Teacher, Role::Teacher | Role::Admin) => Gate::Allow,
        (Area::Teacher, Role::Student) => Gate::Redirect(Route::StudentHome),
        (Area::Admin, Role::Admin) => Gate::Allow,
        (Area::Admin, Role::Student) => Gate::Redirect(Route::StudentHome),
        (Area::Admin, Role::Teacher) => Gate::Redirect(Route::TeacherHome),
    }
}

pub fn require(area: Area, role: Role) -> anyhow::Result<()> {
    match gate(area, role) {
        Gate::Allow => Ok(()),
        Gate::Redirect(route) => anyhow::bail!(
            "{NO_ACCESS}: this command is not available to {role} accounts (home: {route})"
        ),
        Gate::Deny => anyhow::bail!("{NO_ACCESS}"),
    }
}
