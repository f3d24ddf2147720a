//! Platform-wide catalog data: product types with their field and variant
//! option definitions, and the category tree.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::helpers::slug::slugify;
use crate::application::use_cases::{authorization::require_platform_admin, user::UserRepo};
use crate::domain::entities::{
    category::Category,
    product_type::{
        FieldType, ProductFieldDefinition, ProductType, ProductTypeDetails, VariantOptionDefinition,
    },
};

#[async_trait]
pub trait ProductTypeRepo: Send + Sync {
    /// Inserts the type together with its definitions.
    async fn create(&self, details: &ProductTypeDetails) -> AppResult<ProductTypeDetails>;
    async fn slug_exists(&self, slug: &str) -> AppResult<bool>;
    async fn list(&self) -> AppResult<Vec<ProductType>>;
    async fn get_details(&self, id: Uuid) -> AppResult<Option<ProductTypeDetails>>;
}

#[async_trait]
pub trait CategoryRepo: Send + Sync {
    async fn create(&self, category: &Category) -> AppResult<Category>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Category>>;
    async fn slug_exists(&self, slug: &str) -> AppResult<bool>;
    async fn list_all(&self) -> AppResult<Vec<Category>>;
}

#[derive(Debug, Clone)]
pub struct FieldDefinitionInput {
    pub field_name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub regex: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub multiple_values: bool,
    pub options: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VariantOptionInput {
    pub option_name: String,
    pub required: bool,
    pub allowed_values: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProductTypeInput {
    pub name: String,
    pub slug: Option<String>,
    pub fields: Vec<FieldDefinitionInput>,
    pub variant_options: Vec<VariantOptionInput>,
}

#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

/// A category with its sub-categories, ordered by name.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

#[derive(Clone)]
pub struct CatalogUseCases {
    types: Arc<dyn ProductTypeRepo>,
    categories: Arc<dyn CategoryRepo>,
    users: Arc<dyn UserRepo>,
}

impl CatalogUseCases {
    pub fn new(
        types: Arc<dyn ProductTypeRepo>,
        categories: Arc<dyn CategoryRepo>,
        users: Arc<dyn UserRepo>,
    ) -> Self {
        Self {
            types,
            categories,
            users,
        }
    }

    // ========================================================================
    // Product types
    // ========================================================================

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product_type(
        &self,
        user_id: Uuid,
        input: ProductTypeInput,
    ) -> AppResult<ProductTypeDetails> {
        require_platform_admin(self.users.as_ref(), user_id).await?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Product type name is required".into()));
        }
        let slug = slugify(input.slug.as_deref().unwrap_or(name));
        if slug.is_empty() {
            return Err(AppError::InvalidInput("Product type slug is empty".into()));
        }
        if self.types.slug_exists(&slug).await? {
            return Err(AppError::Conflict {
                field: "slug",
                message: format!("A product type with slug '{slug}' already exists"),
            });
        }

        let type_id = Uuid::new_v4();
        let fields = field_definitions(type_id, input.fields)?;
        let variant_options = option_definitions(type_id, input.variant_options)?;

        let details = self
            .types
            .create(&ProductTypeDetails {
                product_type: ProductType {
                    id: type_id,
                    name: name.to_string(),
                    slug,
                    created_at: Some(Utc::now().naive_utc()),
                },
                fields,
                variant_options,
            })
            .await?;
        info!(product_type_id = %details.product_type.id, "Product type created");
        Ok(details)
    }

    pub async fn list_product_types(&self) -> AppResult<Vec<ProductType>> {
        let mut types = self.types.list().await?;
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    pub async fn get_product_type(&self, id: Uuid) -> AppResult<ProductTypeDetails> {
        self.types.get_details(id).await?.ok_or(AppError::NotFound)
    }

    // ========================================================================
    // Categories
    // ========================================================================

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(&self, user_id: Uuid, input: CategoryInput) -> AppResult<Category> {
        require_platform_admin(self.users.as_ref(), user_id).await?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Category name is required".into()));
        }
        if let Some(parent_id) = input.parent_id
            && self.categories.get_by_id(parent_id).await?.is_none()
        {
            return Err(AppError::InvalidInput("Parent category does not exist".into()));
        }
        let slug = slugify(input.slug.as_deref().unwrap_or(name));
        if slug.is_empty() {
            return Err(AppError::InvalidInput("Category slug is empty".into()));
        }
        if self.categories.slug_exists(&slug).await? {
            return Err(AppError::Conflict {
                field: "slug",
                message: format!("A category with slug '{slug}' already exists"),
            });
        }

        let now = Utc::now().naive_utc();
        self.categories
            .create(&Category {
                id: Uuid::new_v4(),
                name: name.to_string(),
                slug,
                description: input.description.filter(|d| !d.trim().is_empty()),
                parent_id: input.parent_id,
                is_active: true,
                created_at: Some(now),
                updated_at: Some(now),
            })
            .await
    }

    pub async fn get_category(&self, id: Uuid) -> AppResult<Category> {
        self.categories.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let mut categories = self.categories.list_all().await?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    pub async fn category_tree(&self) -> AppResult<Vec<CategoryNode>> {
        Ok(build_tree(self.categories.list_all().await?))
    }
}

fn field_definitions(
    type_id: Uuid,
    inputs: Vec<FieldDefinitionInput>,
) -> AppResult<Vec<ProductFieldDefinition>> {
    let mut seen = HashSet::new();
    let mut defs = Vec::with_capacity(inputs.len());
    for (position, input) in inputs.into_iter().enumerate() {
        let field_name = input.field_name.trim().to_string();
        if field_name.is_empty() {
            return Err(AppError::InvalidInput("Field name is required".into()));
        }
        if !seen.insert(field_name.clone()) {
            return Err(AppError::InvalidInput(format!("Duplicate field '{field_name}'")));
        }
        if input.field_type == FieldType::Select && input.options.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Select field '{field_name}' needs at least one option"
            )));
        }
        if let (Some(min), Some(max)) = (input.min_value, input.max_value)
            && min > max
        {
            return Err(AppError::InvalidInput(format!(
                "Field '{field_name}' has min_value greater than max_value"
            )));
        }
        defs.push(ProductFieldDefinition {
            id: Uuid::new_v4(),
            product_type_id: type_id,
            field_name,
            field_type: input.field_type,
            required: input.required,
            order_position: position as i32,
            regex: input.regex,
            min_value: input.min_value,
            max_value: input.max_value,
            multiple_values: input.multiple_values,
            options: input.options,
        });
    }
    Ok(defs)
}

fn option_definitions(
    type_id: Uuid,
    inputs: Vec<VariantOptionInput>,
) -> AppResult<Vec<VariantOptionDefinition>> {
    let mut seen = HashSet::new();
    let mut defs = Vec::with_capacity(inputs.len());
    for (position, input) in inputs.into_iter().enumerate() {
        let option_name = input.option_name.trim().to_string();
        if option_name.is_empty() {
            return Err(AppError::InvalidInput("Option name is required".into()));
        }
        if !seen.insert(option_name.clone()) {
            return Err(AppError::InvalidInput(format!("Duplicate option '{option_name}'")));
        }
        defs.push(VariantOptionDefinition {
            id: Uuid::new_v4(),
            product_type_id: type_id,
            option_name,
            required: input.required,
            order_position: position as i32,
            allowed_values: input.allowed_values,
        });
    }
    Ok(defs)
}

/// Nest categories under their parents. Categories whose parent is missing become roots.
pub fn build_tree(categories: Vec<Category>) -> Vec<CategoryNode> {
    let ids: HashSet<Uuid> = categories.iter().map(|c| c.id).collect();
    let mut children: HashMap<Uuid, Vec<Category>> = HashMap::new();
    let mut roots = Vec::new();
    for category in categories {
        match category.parent_id {
            Some(parent) if ids.contains(&parent) && parent != category.id => {
                children.entry(parent).or_default().push(category)
            }
            _ => roots.push(category),
        }
    }

    let mut nodes = attach(roots, &mut children);
    nodes.sort_by(|a, b| a.category.name.cmp(&b.category.name));
    nodes
}

fn attach(categories: Vec<Category>, children: &mut HashMap<Uuid, Vec<Category>>) -> Vec<CategoryNode> {
    let mut nodes: Vec<CategoryNode> = categories
        .into_iter()
        .map(|category| {
            let kids = children.remove(&category.id).unwrap_or_default();
            CategoryNode {
                children: attach(kids, children),
                category,
            }
        })
        .collect();
    nodes.sort_by(|a, b| a.category.name.cmp(&b.category.name));
    nodes
}
