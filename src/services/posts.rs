use crate::POST_IMAGES_DIRECTORY;
use crate::domain::auth::AuthenticatedUser;
use crate::domain::post::Post;
use crate::domain::types::PostId;
use crate::dto::categories::CategoryDto;
use crate::dto::posts::{PostDetailView, PostDto, PostEditView, PostFormView};
use crate::forms::errors::FieldErrors;
use crate::forms::posts::{CATEGORY_INVALID, PostFormError, PostFormPayload, PostInput};
use crate::pagination::{DEFAULT_ITEMS_PER_PAGE, Paginated};
use crate::repository::{CategoryReader, PostListQuery, PostReader, PostWriter, UserReader};
use crate::storage::{FileStorage, discard};

use super::{Redirect, ServiceError, ServiceResult};

/// Checks the submission and resolves its categories against the repository.
///
/// Field errors from the form and unknown category ids are reported
/// together; nothing is written.
fn validate_post_input<R>(input: PostInput, repo: &R) -> ServiceResult<PostFormPayload>
where
    R: CategoryReader,
{
    let requested = input.category_ids();
    let parsed = PostFormPayload::try_from(input);

    let mut errors = match &parsed {
        Err(PostFormError::Validation(errors)) => errors.clone(),
        _ => FieldErrors::new(),
    };

    if !errors.has("category") && !requested.is_empty() {
        let missing = repo.missing_category_ids(&requested).map_err(|e| {
            log::error!("Failed to check category ids: {e}");
            ServiceError::Internal
        })?;
        if !missing.is_empty() {
            log::debug!("Rejected unknown category ids: {missing:?}");
            errors.add("category", CATEGORY_INVALID);
        }
    }

    if !errors.is_empty() {
        return Err(ServiceError::Validation(errors));
    }

    Ok(parsed?)
}

/// Loads a post the user is allowed to modify.
fn load_owned_post<R>(post_id: i32, user: &AuthenticatedUser, repo: &R) -> ServiceResult<Post>
where
    R: PostReader,
{
    let post_id = PostId::new(post_id).map_err(|_| ServiceError::NotFound)?;

    let post = match repo.get_post_by_id(post_id) {
        Ok(Some(post)) => post,
        Ok(None) => return Err(ServiceError::NotFound),
        Err(e) => {
            log::error!("Failed to get post: {e}");
            return Err(ServiceError::Internal);
        }
    };

    if !user.owns(post.user_id) {
        log::warn!(
            "User {} attempted to modify post {} owned by {}",
            user.id,
            post.id,
            post.user_id
        );
        return Err(ServiceError::Unauthorized);
    }

    Ok(post)
}

fn list_category_dtos<R>(repo: &R) -> ServiceResult<Vec<CategoryDto>>
where
    R: CategoryReader,
{
    match repo.list_categories() {
        Ok(categories) => Ok(categories.into_iter().map(CategoryDto::from).collect()),
        Err(e) => {
            log::error!("Failed to list categories: {e}");
            Err(ServiceError::Internal)
        }
    }
}

/// View-model of the create form. No categories is a valid, empty list.
pub fn show_create_form<R>(repo: &R) -> ServiceResult<PostFormView>
where
    R: CategoryReader,
{
    Ok(PostFormView {
        all_categories: list_category_dtos(repo)?,
    })
}

/// Creates a post owned by `user` and redirects to the index.
///
/// The image is written first; if the database write then fails the file is
/// removed again.
pub fn store_post<R, S>(
    input: PostInput,
    user: &AuthenticatedUser,
    repo: &R,
    storage: &S,
) -> ServiceResult<Redirect>
where
    R: CategoryReader + PostWriter,
    S: FileStorage + ?Sized,
{
    let payload = validate_post_input(input, repo)?;

    let image_path = storage
        .put(
            POST_IMAGES_DIRECTORY,
            payload.image.format.extension(),
            &payload.image.bytes,
        )
        .map_err(|e| {
            log::error!("Failed to store post image: {e}");
            ServiceError::Internal
        })?;

    let new_post = payload.into_new_post(user.id, image_path.clone());
    match repo.create_post(&new_post) {
        Ok(post_id) => {
            log::info!("User {} created post {post_id}", user.id);
            Ok(Redirect::Index)
        }
        Err(e) => {
            log::error!("Failed to create post: {e}");
            discard(storage, &image_path);
            Err(ServiceError::Internal)
        }
    }
}

/// Replaces the description, image and categories of a post owned by `user`
/// and redirects to the post page. The previous image is removed afterwards.
pub fn update_post<R, S>(
    post_id: i32,
    input: PostInput,
    user: &AuthenticatedUser,
    repo: &R,
    storage: &S,
) -> ServiceResult<Redirect>
where
    R: CategoryReader + PostReader + PostWriter,
    S: FileStorage + ?Sized,
{
    let post = load_owned_post(post_id, user, repo)?;
    let payload = validate_post_input(input, repo)?;

    let image_path = storage
        .put(
            POST_IMAGES_DIRECTORY,
            payload.image.format.extension(),
            &payload.image.bytes,
        )
        .map_err(|e| {
            log::error!("Failed to store post image: {e}");
            ServiceError::Internal
        })?;

    let changes = payload.into_changes(image_path.clone());
    match repo.update_post(post.id, &changes) {
        Ok(0) => {
            discard(storage, &image_path);
            Err(ServiceError::NotFound)
        }
        Ok(_) => {
            if post.image_path != image_path {
                discard(storage, &post.image_path);
            }
            log::info!("User {} updated post {}", user.id, post.id);
            Ok(Redirect::ShowPost(post.id))
        }
        Err(e) => {
            log::error!("Failed to update post: {e}");
            discard(storage, &image_path);
            Err(ServiceError::Internal)
        }
    }
}

/// Newest posts first, one page at a time.
pub fn show_posts<R, S>(page: usize, repo: &R, storage: &S) -> ServiceResult<Paginated<PostDto>>
where
    R: PostReader,
    S: FileStorage + ?Sized,
{
    let page = page.max(1);
    let query = PostListQuery::default().paginate(page, DEFAULT_ITEMS_PER_PAGE);

    match repo.list_posts(query) {
        Ok((total, posts)) => {
            let total_pages = total.div_ceil(DEFAULT_ITEMS_PER_PAGE);
            let items = posts
                .into_iter()
                .map(|post| PostDto::from_post(post, storage))
                .collect();
            Ok(Paginated::new(items, page, total_pages))
        }
        Err(e) => {
            log::error!("Failed to list posts: {e}");
            Err(ServiceError::Internal)
        }
    }
}

pub fn show_post<R, S>(
    post_id: i32,
    user: Option<&AuthenticatedUser>,
    repo: &R,
    storage: &S,
) -> ServiceResult<PostDetailView>
where
    R: PostReader + UserReader,
    S: FileStorage + ?Sized,
{
    let post_id = PostId::new(post_id).map_err(|_| ServiceError::NotFound)?;

    let post = match repo.get_post_by_id(post_id) {
        Ok(Some(post)) => post,
        Ok(None) => return Err(ServiceError::NotFound),
        Err(e) => {
            log::error!("Failed to get post: {e}");
            return Err(ServiceError::Internal);
        }
    };

    let author_name = match repo.get_user_by_id(post.user_id) {
        Ok(author) => author.map(|u| u.name.into_inner()),
        Err(e) => {
            log::error!("Failed to get post author: {e}");
            return Err(ServiceError::Internal);
        }
    };

    let can_edit = user.is_some_and(|u| u.owns(post.user_id));

    Ok(PostDetailView {
        post: PostDto::from_post(post, storage),
        author_name,
        can_edit,
    })
}

pub fn show_edit_form<R, S>(
    post_id: i32,
    user: &AuthenticatedUser,
    repo: &R,
    storage: &S,
) -> ServiceResult<PostEditView>
where
    R: CategoryReader + PostReader,
    S: FileStorage + ?Sized,
{
    let post = load_owned_post(post_id, user, repo)?;
    let all_categories = list_category_dtos(repo)?;
    let selected_category_ids = post.category_ids().into_iter().map(i32::from).collect();

    Ok(PostEditView {
        post: PostDto::from_post(post, storage),
        all_categories,
        selected_category_ids,
    })
}

/// Deletes a post with its category assignments, then its image.
pub fn destroy_post<R, S>(
    post_id: i32,
    user: &AuthenticatedUser,
    repo: &R,
    storage: &S,
) -> ServiceResult<Redirect>
where
    R: PostReader + PostWriter,
    S: FileStorage + ?Sized,
{
    let post = load_owned_post(post_id, user, repo)?;

    match repo.delete_post(post.id) {
        Ok(0) => Err(ServiceError::NotFound),
        Ok(_) => {
            discard(storage, &post.image_path);
            log::info!("User {} deleted post {}", user.id, post.id);
            Ok(Redirect::Index)
        }
        Err(e) => {
            log::error!("Failed to delete post: {e}");
            Err(ServiceError::Internal)
        }
    }
}
