//! Compile-time–checked column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Email,
    GoogleId,
    Name,
    IsAdmin,
    CreatedAt,
}

#[derive(Iden)]
pub enum InviteCodes {
    Table,
    Id,
    Code,
    Email,
    Used,
    UsedBy,
    CreatedBy,
    CreatedAt,
    UsedAt,
}

#[derive(Iden)]
pub enum Sessions {
    Table,
    Id,
    UserId,
    ExpiresAt,
}

#[derive(Iden)]
pub enum MarketplaceTypes {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
pub enum Marketplaces {
    Table,
    Id,
    UserId,
    MarketplaceTypeId,
    CreatedAt,
}

#[derive(Iden)]
pub enum SalesEntries {
    Table,
    Id,
    UserId,
    MarketplaceId,
    Date,
    Amount,
    CreatedAt,
    UpdatedAt,
}
