//! Payload validation

use crate::slug::is_valid_slug;
use crate::{QuillError, Result};
use quill_types::{
    CategoryPatch, CommentPatch, NewCategory, NewComment, NewMedia, NewPost, NewTag, PostPatch,
    ProfileUpdate, TagPatch, UserRegistration,
};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Check a payload before it reaches storage
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(QuillError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

pub fn slug(field: &str, value: &str) -> Result<()> {
    if !is_valid_slug(value) {
        return Err(QuillError::Validation(format!(
            "{} must be lowercase words separated by hyphens",
            field
        )));
    }
    Ok(())
}

pub fn email(value: &str) -> Result<()> {
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(QuillError::Validation("email is invalid".to_string())),
    }
}

pub fn username(value: &str) -> Result<()> {
    let ok = (3..=32).contains(&value.chars().count())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !ok {
        return Err(QuillError::Validation(
            "username must be 3-32 letters, digits, '_' or '-'".to_string(),
        ));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<()> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(QuillError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

impl Validate for NewPost {
    fn validate(&self) -> Result<()> {
        non_empty("title", &self.title)?;
        slug("slug", &self.slug)?;
        non_empty("content", &self.content)?;
        non_empty("author", &self.author)
    }
}

impl Validate for PostPatch {
    fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            non_empty("title", title)?;
        }
        if let Some(s) = &self.slug {
            slug("slug", s)?;
        }
        if let Some(content) = &self.content {
            non_empty("content", content)?;
        }
        if let Some(author) = &self.author {
            non_empty("author", author)?;
        }
        Ok(())
    }
}

impl Validate for NewCategory {
    fn validate(&self) -> Result<()> {
        non_empty("name", &self.name)?;
        slug("slug", &self.slug)
    }
}

impl Validate for CategoryPatch {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            non_empty("name", name)?;
        }
        if let Some(s) = &self.slug {
            slug("slug", s)?;
        }
        Ok(())
    }
}

impl Validate for NewTag {
    fn validate(&self) -> Result<()> {
        non_empty("name", &self.name)?;
        slug("slug", &self.slug)
    }
}

impl Validate for TagPatch {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            non_empty("name", name)?;
        }
        if let Some(s) = &self.slug {
            slug("slug", s)?;
        }
        Ok(())
    }
}

impl Validate for NewComment {
    fn validate(&self) -> Result<()> {
        non_empty("content", &self.content)?;
        non_empty("authorName", &self.author_name)?;
        email(&self.author_email)
    }
}

impl Validate for CommentPatch {
    fn validate(&self) -> Result<()> {
        if let Some(content) = &self.content {
            non_empty("content", content)?;
        }
        Ok(())
    }
}

impl Validate for NewMedia {
    fn validate(&self) -> Result<()> {
        non_empty("filename", &self.filename)?;
        non_empty("filePath", &self.file_path)?;
        non_empty("fileType", &self.file_type)?;
        if self.file_size < 0 {
            return Err(QuillError::Validation(
                "fileSize must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl Validate for UserRegistration {
    fn validate(&self) -> Result<()> {
        username(&self.username)?;
        email(&self.email)?;
        password(&self.password)
    }
}

impl Validate for ProfileUpdate {
    fn validate(&self) -> Result<()> {
        if let Some(value) = &self.email {
            email(value)?;
        }
        if let Some(value) = &self.password {
            password(value)?;
        }
        Ok(())
    }
}
