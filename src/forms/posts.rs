use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;

use actix_multipart::form::tempfile::TempFile;
use actix_multipart::form::text::Text;
use actix_multipart::form::{
    DuplicateField, FieldGroupReader, FieldReader, Limits, MultipartCollect, State,
};
use actix_multipart::{Field, MultipartError};
use actix_web::HttpRequest;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::domain::post::{NewPost, PostChanges};
use crate::domain::types::{
    CategoryId, ImageFormat, ImagePath, PostDescription, TypeConstraintError, UserId,
};
use crate::forms::errors::FieldErrors;

pub const CATEGORY_NOT_ARRAY: &str = "The category field must be an array.";
pub const CATEGORY_REQUIRED: &str = "The category field is required.";
pub const CATEGORY_INVALID: &str = "The selected category is invalid.";
pub const DESCRIPTION_REQUIRED: &str = "The description field is required.";
pub const DESCRIPTION_TOO_LONG: &str =
    "The description field must not be greater than 2000 characters.";
pub const IMAGE_REQUIRED: &str = "The image field is required.";
pub const IMAGE_NOT_AN_IMAGE: &str = "The image field must be an image.";
pub const IMAGE_UPLOAD_FAILED: &str = "The image failed to upload.";

/// Longest accepted description, in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 2000;

/// Byte cap on the description echoed back through the session cookie.
pub const OLD_DESCRIPTION_MAX_BYTES: usize = 400;

/// Number of category ids echoed back through the session cookie.
pub const OLD_CATEGORY_MAX: usize = 32;

/// Multipart body submitted by the create and edit forms.
///
/// Categories arrive as repeated `category[]` parts or as indexed
/// `category[0]`, `category[1]`, ... parts, collected in submission order. A
/// bare `category` part is captured separately so it can be rejected as a
/// non-array value.
pub struct PostForm {
    pub category_list: Vec<Text<String>>,
    pub category: Option<Text<String>>,
    pub description: Option<Text<String>>,
    pub image: Option<TempFile>,
}

const CATEGORY_LIST_PART: &str = "category[]";
const IMAGE_PART_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PostPart {
    CategoryItem,
    Category,
    Description,
    Image,
    Unknown,
}

impl PostPart {
    fn from_name(name: &str) -> Self {
        match name {
            "category" => Self::Category,
            "description" => Self::Description,
            "image" => Self::Image,
            _ if is_category_item(name) => Self::CategoryItem,
            _ => Self::Unknown,
        }
    }
}

/// `category[]` or `category[N]` with a decimal index.
fn is_category_item(name: &str) -> bool {
    name.strip_prefix("category[")
        .and_then(|rest| rest.strip_suffix(']'))
        .is_some_and(|index| index.bytes().all(|b| b.is_ascii_digit()))
}

impl MultipartCollect for PostForm {
    fn limit(field_name: &str) -> Option<usize> {
        (PostPart::from_name(field_name) == PostPart::Image).then_some(IMAGE_PART_LIMIT)
    }

    fn handle_field<'t>(
        req: &'t HttpRequest,
        field: Field,
        limits: &'t mut Limits,
        state: &'t mut State,
    ) -> Pin<Box<dyn Future<Output = Result<(), MultipartError>> + 't>> {
        match PostPart::from_name(field.name().unwrap_or_default()) {
            PostPart::CategoryItem => Box::pin(async move {
                let item = Text::<String>::read_field(req, field, limits).await?;
                if let Some(items) = state
                    .entry(CATEGORY_LIST_PART.to_string())
                    .or_insert_with(|| Box::<Vec<Text<String>>>::default())
                    .downcast_mut::<Vec<Text<String>>>()
                {
                    items.push(item);
                }
                Ok(())
            }),
            PostPart::Category | PostPart::Description => {
                Box::pin(<Option<Text<String>> as FieldGroupReader>::handle_field(
                    req,
                    field,
                    limits,
                    state,
                    DuplicateField::Ignore,
                ))
            }
            PostPart::Image => Box::pin(<Option<TempFile> as FieldGroupReader>::handle_field(
                req,
                field,
                limits,
                state,
                DuplicateField::Ignore,
            )),
            PostPart::Unknown => Box::pin(std::future::ready(Ok(()))),
        }
    }

    fn from_state(mut state: State) -> Result<Self, MultipartError> {
        Ok(Self {
            category_list: <Vec<Text<String>> as FieldGroupReader>::from_state(
                CATEGORY_LIST_PART,
                &mut state,
            )?,
            category: <Option<Text<String>> as FieldGroupReader>::from_state(
                "category",
                &mut state,
            )?,
            description: <Option<Text<String>> as FieldGroupReader>::from_state(
                "description",
                &mut state,
            )?,
            image: <Option<TempFile> as FieldGroupReader>::from_state("image", &mut state)?,
        })
    }
}

impl PostForm {
    /// Reads the uploaded parts into a framework-independent [`PostInput`].
    pub fn into_input(self) -> PostInput {
        let category = if !self.category_list.is_empty() {
            CategoryField::List(
                self.category_list
                    .into_iter()
                    .map(Text::into_inner)
                    .collect(),
            )
        } else if let Some(value) = self.category {
            CategoryField::Scalar(value.into_inner())
        } else {
            CategoryField::Missing
        };

        let description = self
            .description
            .map(Text::into_inner)
            .unwrap_or_default();

        let image = match self.image {
            None => ImageField::Missing,
            Some(file) if file.size == 0 => ImageField::Missing,
            Some(file) => match std::fs::read(file.file.path()) {
                Ok(bytes) => ImageField::File(bytes),
                Err(e) => {
                    log::error!("Failed to read uploaded image: {e}");
                    ImageField::Unreadable
                }
            },
        };

        PostInput::new(category, description, image)
    }
}

/// Shape of the submitted `category` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CategoryField {
    Missing,
    Scalar(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageField {
    Missing,
    /// A part was sent but could not be read back from the temp file.
    Unreadable,
    File(Vec<u8>),
}

/// Validation errors carry the field value as a param; an upload is
/// reported by its size only.
impl Serialize for ImageField {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Missing => serializer.serialize_none(),
            Self::Unreadable => serializer.serialize_str("unreadable"),
            Self::File(bytes) => serializer.serialize_u64(bytes.len() as u64),
        }
    }
}

/// Submitted post fields before validation.
#[derive(Debug, Clone, Validate)]
pub struct PostInput {
    #[validate(custom(function = "validate_category_field"))]
    pub category: CategoryField,
    #[validate(
        length(min = 1, message = "The description field is required."),
        custom(function = "validate_description_length")
    )]
    pub description: String,
    #[validate(custom(function = "validate_image_field"))]
    pub image: ImageField,
}

impl PostInput {
    pub fn new(category: CategoryField, description: impl Into<String>, image: ImageField) -> Self {
        Self {
            category,
            description: description.into().trim().to_string(),
            image,
        }
    }

    /// Positive ids among the submitted categories, deduplicated in
    /// submission order. Empty unless categories were sent as an array.
    pub fn category_ids(&self) -> Vec<CategoryId> {
        let mut ids = Vec::new();
        if let CategoryField::List(values) = &self.category {
            for id in values.iter().filter_map(|v| parse_category_id(v)) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Values echoed back into the form after a failed submission.
    ///
    /// The echo lives in the cookie session, so the description is cut at
    /// [`OLD_DESCRIPTION_MAX_BYTES`] and only parsed category ids are kept.
    pub fn old_input(&self) -> OldInput {
        OldInput {
            description: truncate_on_char_boundary(&self.description, OLD_DESCRIPTION_MAX_BYTES)
                .chars()
                .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
                .collect(),
            category: self
                .category_ids()
                .into_iter()
                .take(OLD_CATEGORY_MAX)
                .map(|id| id.to_string())
                .collect(),
        }
    }
}

/// Previously submitted values kept in the session under `old`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldInput {
    pub description: String,
    pub category: Vec<String>,
}

fn truncate_on_char_boundary(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn parse_category_id(value: &str) -> Option<CategoryId> {
    value
        .trim()
        .parse::<i32>()
        .ok()
        .and_then(|id| CategoryId::new(id).ok())
}

fn validate_category_field(value: &CategoryField) -> Result<(), ValidationError> {
    match value {
        CategoryField::Missing => Err(field_error("required", CATEGORY_REQUIRED)),
        CategoryField::Scalar(_) => Err(field_error("array", CATEGORY_NOT_ARRAY)),
        CategoryField::List(values) if values.iter().all(|v| v.trim().is_empty()) => {
            Err(field_error("required", CATEGORY_REQUIRED))
        }
        CategoryField::List(values) => {
            if values.iter().all(|v| parse_category_id(v).is_some()) {
                Ok(())
            } else {
                Err(field_error("exists", CATEGORY_INVALID))
            }
        }
    }
}

fn validate_description_length(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > DESCRIPTION_MAX_CHARS {
        Err(field_error("max", DESCRIPTION_TOO_LONG))
    } else {
        Ok(())
    }
}

fn validate_image_field(value: &ImageField) -> Result<(), ValidationError> {
    match value {
        ImageField::Missing => Err(field_error("required", IMAGE_REQUIRED)),
        ImageField::Unreadable => Err(field_error("uploaded", IMAGE_UPLOAD_FAILED)),
        ImageField::File(bytes) => detect_image_format(bytes)
            .map(|_| ())
            .ok_or_else(|| field_error("image", IMAGE_NOT_AN_IMAGE)),
    }
}

/// Sniffs a raster format from the file header and requires readable,
/// non-zero dimensions. The client-declared content type is ignored.
pub fn detect_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    let format = match imagesize::image_type(bytes).ok()? {
        imagesize::ImageType::Jpeg => ImageFormat::Jpeg,
        imagesize::ImageType::Png => ImageFormat::Png,
        imagesize::ImageType::Gif => ImageFormat::Gif,
        imagesize::ImageType::Bmp => ImageFormat::Bmp,
        imagesize::ImageType::Webp => ImageFormat::Webp,
        _ => return None,
    };
    let size = imagesize::blob_size(bytes).ok()?;
    (size.width > 0 && size.height > 0).then_some(format)
}

/// Image bytes that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

/// Syntactically valid post submission.
///
/// Category ids are positive and deduplicated in submission order; whether
/// they exist is checked against the repository by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct PostFormPayload {
    pub category_ids: Vec<CategoryId>,
    pub description: PostDescription,
    pub image: ImageUpload,
}

impl PostFormPayload {
    pub fn into_new_post(self, user_id: UserId, image_path: ImagePath) -> NewPost {
        let now = Utc::now().naive_utc();
        NewPost {
            user_id,
            description: self.description,
            image_path,
            category_ids: self.category_ids,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn into_changes(self, image_path: ImagePath) -> PostChanges {
        PostChanges {
            description: self.description,
            image_path,
            category_ids: self.category_ids,
        }
    }
}

#[derive(Debug, Error)]
pub enum PostFormError {
    #[error("Post form validation failed: {0}")]
    Validation(FieldErrors),
    #[error("Post form contains invalid data: {0}")]
    TypeConstraint(String),
}

impl From<ValidationErrors> for PostFormError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value.into())
    }
}

impl From<TypeConstraintError> for PostFormError {
    fn from(value: TypeConstraintError) -> Self {
        Self::TypeConstraint(value.to_string())
    }
}

impl TryFrom<PostInput> for PostFormPayload {
    type Error = PostFormError;

    fn try_from(value: PostInput) -> Result<Self, Self::Error> {
        value.validate()?;

        let category_ids = value.category_ids();
        if category_ids.is_empty() {
            return Err(PostFormError::Validation(FieldErrors::single(
                "category",
                CATEGORY_REQUIRED,
            )));
        }

        let image = match value.image {
            ImageField::File(bytes) => {
                let format = detect_image_format(&bytes).ok_or_else(|| {
                    PostFormError::Validation(FieldErrors::single("image", IMAGE_NOT_AN_IMAGE))
                })?;
                ImageUpload { bytes, format }
            }
            _ => {
                return Err(PostFormError::Validation(FieldErrors::single(
                    "image",
                    IMAGE_REQUIRED,
                )));
            }
        };

        Ok(Self {
            category_ids,
            description: PostDescription::new(value.description)?,
            image,
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// A 1x1 transparent PNG.
    pub const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    pub fn png_image() -> ImageField {
        ImageField::File(PNG_1X1.to_vec())
    }

    pub fn categories(values: &[&str]) -> CategoryField {
        CategoryField::List(values.iter().map(|v| v.to_string()).collect())
    }

    fn validation_errors(input: PostInput) -> FieldErrors {
        match PostFormPayload::try_from(input) {
            Err(PostFormError::Validation(errors)) => errors,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn accepts_complete_submission() {
        let input = PostInput::new(categories(&["2", "1", "2"]), "  Sunset  ", png_image());

        let payload = PostFormPayload::try_from(input).unwrap();

        assert_eq!(payload.description.as_str(), "Sunset");
        assert_eq!(
            payload.category_ids,
            vec![CategoryId::new(2).unwrap(), CategoryId::new(1).unwrap()]
        );
        assert_eq!(payload.image.format, ImageFormat::Png);
    }

    #[test]
    fn scalar_category_is_not_an_array() {
        let input = PostInput::new(CategoryField::Scalar("1".into()), "Sunset", png_image());

        let errors = validation_errors(input);

        assert_eq!(errors.first("category"), Some(CATEGORY_NOT_ARRAY));
    }

    #[test]
    fn missing_or_empty_category_is_required() {
        for category in [CategoryField::Missing, categories(&[]), categories(&[" "])] {
            let errors = validation_errors(PostInput::new(category, "Sunset", png_image()));
            assert_eq!(errors.first("category"), Some(CATEGORY_REQUIRED));
        }
    }

    #[test]
    fn non_numeric_category_is_invalid() {
        let errors = validation_errors(PostInput::new(
            categories(&["1", "abc"]),
            "Sunset",
            png_image(),
        ));

        assert_eq!(errors.first("category"), Some(CATEGORY_INVALID));
    }

    #[test]
    fn reports_every_failing_field() {
        let errors = validation_errors(PostInput::new(
            CategoryField::Missing,
            "   ",
            ImageField::Missing,
        ));

        assert_eq!(errors.first("category"), Some(CATEGORY_REQUIRED));
        assert_eq!(errors.first("description"), Some(DESCRIPTION_REQUIRED));
        assert_eq!(errors.first("image"), Some(IMAGE_REQUIRED));
    }

    #[test]
    fn rejects_files_that_are_not_images() {
        let image = ImageField::File(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>".to_vec());

        let errors = validation_errors(PostInput::new(categories(&["1"]), "Logo", image));

        assert_eq!(errors.first("image"), Some(IMAGE_NOT_AN_IMAGE));
    }

    #[test]
    fn unreadable_upload_is_reported() {
        let errors = validation_errors(PostInput::new(
            categories(&["1"]),
            "Sunset",
            ImageField::Unreadable,
        ));

        assert_eq!(errors.first("image"), Some(IMAGE_UPLOAD_FAILED));
    }

    #[test]
    fn old_input_echoes_submitted_values() {
        let input = PostInput::new(categories(&["3", "x", "3", "1"]), " Hi ", ImageField::Missing);

        assert_eq!(
            input.old_input(),
            OldInput {
                description: "Hi".to_string(),
                category: vec!["3".to_string(), "1".to_string()],
            }
        );
    }

    #[test]
    fn derived_validation_reports_field_rules() {
        let input = PostInput::new(
            CategoryField::Scalar("1".into()),
            "",
            ImageField::File(b"not an image".to_vec()),
        );

        let errors: FieldErrors = input.validate().unwrap_err().into();

        assert_eq!(errors.first("category"), Some(CATEGORY_NOT_ARRAY));
        assert_eq!(errors.first("description"), Some(DESCRIPTION_REQUIRED));
        assert_eq!(errors.first("image"), Some(IMAGE_NOT_AN_IMAGE));
    }

    #[test]
    fn overlong_description_is_rejected() {
        let description = "a".repeat(DESCRIPTION_MAX_CHARS + 1);
        let errors = validation_errors(PostInput::new(categories(&["1"]), description, png_image()));

        assert_eq!(errors.first("description"), Some(DESCRIPTION_TOO_LONG));
    }

    #[test]
    fn description_at_the_limit_is_accepted() {
        let description = "é".repeat(DESCRIPTION_MAX_CHARS);
        let payload =
            PostFormPayload::try_from(PostInput::new(categories(&["1"]), description, png_image()))
                .unwrap();

        assert_eq!(payload.description.chars().count(), DESCRIPTION_MAX_CHARS);
    }

    #[test]
    fn old_input_stays_small_for_huge_submissions() {
        let ids: Vec<String> = (1..=500).map(|id| id.to_string()).collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        let input = PostInput::new(
            categories(&ids),
            format!("{}\u{0}", "ж".repeat(5000)),
            ImageField::Missing,
        );

        let old = input.old_input();

        assert!(old.description.len() <= OLD_DESCRIPTION_MAX_BYTES);
        assert!(old.description.chars().all(|c| c == 'ж'));
        assert_eq!(old.category.len(), OLD_CATEGORY_MAX);
    }

    #[test]
    fn indexed_category_parts_join_the_list() {
        for name in ["category[]", "category[0]", "category[12]"] {
            assert_eq!(PostPart::from_name(name), PostPart::CategoryItem, "{name}");
        }
        for name in ["category[x]", "category[0", "categories[]", "category[][]"] {
            assert_eq!(PostPart::from_name(name), PostPart::Unknown, "{name}");
        }
        assert_eq!(PostPart::from_name("category"), PostPart::Category);
        assert_eq!(PostForm::limit("image"), Some(IMAGE_PART_LIMIT));
        assert_eq!(PostForm::limit("category[0]"), None);
    }
}
